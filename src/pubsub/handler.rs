use std::future::Future;

use async_trait::async_trait;

use super::Event;
use crate::error::HandlerResult;

/// Обработчик сообщений подписки.
///
/// Вызывается на воркере пула доставки, никогда на стеке публикующего.
/// Ошибка обработчика не возвращается издателю.
///
/// Для замыканий вида `|ev| async move { ... }` реализация есть из коробки:
///
/// ```rust
/// use membus::{Event, Handler, HandlerResult};
///
/// fn assert_handler<H: Handler<String>>(_: H) {}
///
/// assert_handler(|ev: Event<String>| async move {
///     let _ = ev.message();
///     HandlerResult::Ok(())
/// });
/// ```
#[async_trait]
pub trait Handler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    async fn handle(
        &self,
        event: Event<T>,
    ) -> HandlerResult;
}

#[async_trait]
impl<T, F, Fut> Handler<T> for F
where
    T: Send + Sync + 'static,
    F: Fn(Event<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(
        &self,
        event: Event<T>,
    ) -> HandlerResult {
        (self)(event).await
    }
}
