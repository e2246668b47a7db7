//! Проверки работоспособности.
//!
//! [`HealthCheck`] — общий интерфейс для всего, что умеет ответить «жив /
//! не жив». Брокер реализует его напрямую, для произвольной асинхронной
//! функции есть обёртка [`CheckFn`].

use std::{fmt, future::Future};

use async_trait::async_trait;

use crate::{error::BrokerResult, pubsub::MemoryBroker};

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// `Ok(())`, если компонент готов обслуживать запросы.
    async fn check_health(&self) -> BrokerResult<()>;
}

/// Адаптер, превращающий асинхронную функцию в [`HealthCheck`].
pub struct CheckFn<F>(pub F);

#[async_trait]
impl<F, Fut> HealthCheck for CheckFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BrokerResult<()>> + Send + 'static,
{
    async fn check_health(&self) -> BrokerResult<()> {
        (self.0)().await
    }
}

impl<F> fmt::Debug for CheckFn<F> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str("CheckFn")
    }
}

#[async_trait]
impl<T> HealthCheck for MemoryBroker<T>
where
    T: Send + Sync + 'static,
{
    async fn check_health(&self) -> BrokerResult<()> {
        MemoryBroker::check_health(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::*;
    use crate::error::BrokerError;

    #[tokio::test]
    async fn test_broker_health_follows_state() {
        let broker = MemoryBroker::<u8>::new();
        let check: &dyn HealthCheck = &broker;
        assert_eq!(
            check.check_health().await,
            Err(BrokerError::InvalidConnectionState)
        );

        broker.open().await.unwrap();
        assert!(check.check_health().await.is_ok());

        broker.close().await.unwrap();
        assert!(check.check_health().await.is_err());
    }

    /// Тест проверяет, что `CheckFn` вызывает обёрнутую функцию при
    /// каждой проверке.
    #[tokio::test]
    async fn test_check_fn() {
        let healthy = Arc::new(AtomicBool::new(true));
        let h = healthy.clone();
        let check = CheckFn(move || {
            let ok = h.load(Ordering::SeqCst);
            async move {
                if ok {
                    Ok(())
                } else {
                    Err(BrokerError::InvalidConnectionState)
                }
            }
        });

        assert!(check.check_health().await.is_ok());
        healthy.store(false, Ordering::SeqCst);
        assert!(check.check_health().await.is_err());
    }
}
