//! Пул воркеров доставки.
//!
//! Классическая схема bounded producer/consumer: `publish` кладёт задачи в
//! ограниченный канал, фиксированное число tokio-задач забирает их и
//! выполняет.
//!
//! ```text
//!   publish ──► sender ──► [ mpsc, capacity = buffer ] ──┬─► worker 0 ─► handler
//!                (await при заполнении)                    ├─► worker 1 ─► handler
//!                                                          └─► worker N ─► handler
//! ```
//!
//! Гарантии:
//! - Отправка ждёт свободного места и никогда не отбрасывает задачу.
//! - Воркеры запускаются один раз, даже если `start` был прерван и вызван
//!   снова.
//! - Паника внутри задачи перехватывается, воркер продолжает работу.
//! - `stop` закрывает приём и ждёт, пока воркеры выберут всё из канала.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex, Semaphore},
    task::JoinHandle,
};

use super::BrokerStats;
use crate::error::{BrokerError, BrokerResult};

/// Отложенная доставка одного сообщения одному обработчику.
pub type Task = BoxFuture<'static, ()>;

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<Task>>>;

/// Фиксированный пул воркеров над общим ограниченным каналом.
pub struct DispatchPool {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Каждый запущенный воркер добавляет одно разрешение
    ready: Arc<Semaphore>,
    worker_count: usize,
    buffer: usize,
    stats: Arc<BrokerStats>,
}

impl DispatchPool {
    /// Создаёт пул. Канал создаётся сразу, воркеры — в [`start`](Self::start).
    ///
    /// Нулевые значения поднимаются до 1.
    pub fn new(
        worker_count: usize,
        buffer: usize,
        stats: Arc<BrokerStats>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let buffer = buffer.max(1);
        let (tx, rx) = mpsc::channel(buffer);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(AsyncMutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            ready: Arc::new(Semaphore::new(0)),
            worker_count,
            buffer,
            stats,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// `true`, пока пул принимает задачи.
    pub fn is_accepting(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Количество запущенных и ещё не остановленных воркеров.
    pub fn spawned(&self) -> usize {
        self.workers.lock().len()
    }

    /// Запускает воркеры и возвращается, когда все они начали выбирать
    /// задачи из канала.
    ///
    /// Воркеры порождаются только при первом вызове. Повторный вызов (в том
    /// числе после прерванного первого) лишь дожидается их готовности.
    pub async fn start(&self) -> BrokerResult<()> {
        if !self.is_accepting() {
            return Err(BrokerError::InvalidConnectionState);
        }

        {
            let mut workers = self.workers.lock();
            if workers.is_empty() {
                workers.extend((0..self.worker_count).map(|id| {
                    tokio::spawn(run_worker(
                        id,
                        self.receiver.clone(),
                        self.ready.clone(),
                        self.stats.clone(),
                    ))
                }));
                tracing::debug!(
                    workers = self.worker_count,
                    buffer = self.buffer,
                    "Dispatch pool started"
                );
            }
        }

        let permits = u32::try_from(self.worker_count).unwrap_or(u32::MAX);
        self.ready
            .acquire_many(permits)
            .await
            .map_err(|_| BrokerError::InvalidConnectionState)?;
        Ok(())
    }

    /// Клон отправителя.
    ///
    /// Пока клон жив, [`stop`](Self::stop) не завершится: так публикация
    /// успевает поставить все свои задачи. Отправка ждёт свободного места.
    /// После `stop` возвращает `InvalidConnectionState`.
    pub(crate) fn sender(&self) -> BrokerResult<mpsc::Sender<Task>> {
        self.sender
            .lock()
            .clone()
            .ok_or(BrokerError::InvalidConnectionState)
    }

    /// Закрывает приём и ждёт завершения всех воркеров.
    ///
    /// Воркеры выходят, когда канал пуст и все клоны отправителя (у
    /// публикаций, которые ещё ставят задачи) освобождены.
    pub async fn stop(&self) -> BrokerResult<()> {
        drop(self.sender.lock().take());

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let mut result = Ok(());
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Dispatch worker failed to join");
                result = Err(BrokerError::WorkerPanicked(err.to_string()));
            }
        }
        tracing::debug!("Dispatch pool stopped");
        result
    }
}

async fn run_worker(
    id: usize,
    receiver: SharedReceiver,
    ready: Arc<Semaphore>,
    stats: Arc<BrokerStats>,
) {
    ready.add_permits(1);
    tracing::trace!(worker = id, "Dispatch worker started");

    loop {
        let next = { receiver.lock().await.recv().await };
        let Some(task) = next else {
            break;
        };
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            stats.record_handler_panic();
            tracing::error!(
                worker = id,
                panic = %panic_message(panic.as_ref()),
                "Delivery task panicked"
            );
        }
        stats.record_completed();
    }

    tracing::trace!(worker = id, "Dispatch worker exited");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::{sync::Notify, time::timeout};

    use super::*;

    async fn submit(
        pool: &DispatchPool,
        task: Task,
    ) -> BrokerResult<()> {
        pool.sender()?
            .send(task)
            .await
            .map_err(|_| BrokerError::InvalidConnectionState)
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Тест проверяет, что все поставленные задачи выполняются до выхода
    /// из `stop`.
    #[tokio::test]
    async fn test_stop_drains_all_tasks() {
        let stats = Arc::new(BrokerStats::new());
        let pool = DispatchPool::new(4, 16, stats.clone());
        pool.start().await.unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            submit(&pool, counting_task(&counter)).await.unwrap();
        }
        pool.stop().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(stats.snapshot().completed, 100);
        assert!(!pool.is_accepting());
    }

    /// Тест проверяет, что после `stop` задачи не принимаются.
    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let pool = DispatchPool::new(1, 1, Arc::new(BrokerStats::new()));
        pool.start().await.unwrap();
        pool.stop().await.unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let err = submit(&pool, counting_task(&counter)).await.unwrap_err();
        assert_eq!(err, BrokerError::InvalidConnectionState);
        assert!(pool.start().await.is_err());
    }

    /// Тест проверяет, что паника в задаче не убивает воркер.
    #[tokio::test]
    async fn test_panic_is_isolated() {
        let stats = Arc::new(BrokerStats::new());
        let pool = DispatchPool::new(1, 8, stats.clone());
        pool.start().await.unwrap();

        let boom: Task = Box::pin(async {
            panic!("handler exploded");
        });
        submit(&pool, boom).await.unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        submit(&pool, counting_task(&counter)).await.unwrap();
        pool.stop().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let snap = stats.snapshot();
        assert_eq!(snap.handler_panics, 1);
        assert_eq!(snap.completed, 2);
    }

    /// Тест проверяет backpressure: при заполненном канале `submit` ждёт,
    /// а не отбрасывает задачу.
    #[tokio::test]
    async fn test_submit_blocks_when_full() {
        let pool = Arc::new(DispatchPool::new(1, 1, Arc::new(BrokerStats::new())));
        pool.start().await.unwrap();

        let gate = Arc::new(Notify::new());
        let g = gate.clone();
        // занимает единственный воркер
        submit(&pool, Box::pin(async move { g.notified().await }))
            .await
            .unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        // даём воркеру забрать первую задачу, затем заполняем канал
        tokio::time::sleep(Duration::from_millis(20)).await;
        submit(&pool, counting_task(&counter)).await.unwrap();

        let blocked = timeout(
            Duration::from_millis(50),
            submit(&pool, counting_task(&counter)),
        )
        .await;
        assert!(blocked.is_err(), "submit должен ждать свободного места");

        gate.notify_one();
        timeout(Duration::from_secs(1), submit(&pool, counting_task(&counter)))
            .await
            .expect("submit не дождался места")
            .unwrap();

        pool.stop().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    /// Тест проверяет, что прерванный `start` и повторный вызов не
    /// порождают лишних воркеров.
    #[tokio::test]
    async fn test_start_after_cancelled_start_spawns_once() {
        let pool = DispatchPool::new(3, 8, Arc::new(BrokerStats::new()));
        // нулевой таймаут прерывает `start` после порождения воркеров
        let _ = timeout(Duration::ZERO, pool.start()).await;
        assert_eq!(pool.spawned(), 3);

        pool.start().await.unwrap();
        pool.start().await.unwrap();
        assert_eq!(pool.spawned(), 3);

        let counter = Arc::new(AtomicUsize::new(0));
        submit(&pool, counting_task(&counter)).await.unwrap();
        pool.stop().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.spawned(), 0);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let pool = DispatchPool::new(0, 0, Arc::new(BrokerStats::new()));
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.buffer(), 1);
    }
}
