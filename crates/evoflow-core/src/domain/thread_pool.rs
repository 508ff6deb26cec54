use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread;

/// A fixed-size worker pool. The pool owns its worker threads for its whole
/// lifetime and joins them on drop, which gives the engine a hard cap on how
/// many collaborator calls (LLM gateway, verifier, evaluator) are in flight
/// at once.
pub struct ThreadPool {
    sender: mpsc::Sender<Message>,
    workers: Vec<Worker>,
}

/// The result of a job submitted with [ThreadPool::submit_with_result].
/// Calling `result()` blocks until the job has run.
pub struct WorkResult<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> WorkResult<T> {
    pub fn result(&self) -> T {
        self.receiver.recv().unwrap()
    }
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        ThreadPool {
            sender,
            workers: (0..size)
                .map(|_| Worker::new(Arc::clone(&receiver)))
                .collect(),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Fire-and-forget job submission.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Message::Work(Box::new(f))).unwrap();
    }

    /// Submits a job and returns a handle to its eventual result.
    pub fn submit_with_result<F, T>(&self, f: F) -> WorkResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.sender
            .send(Message::Work(Box::new(move || {
                let _ = tx.send(f());
            })))
            .unwrap();

        WorkResult { receiver: rx }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in self.workers.iter() {
            let _ = self.sender.send(Message::Terminate);
        }

        for worker in self.workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Work(Job),
    Terminate,
}

struct Worker {
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Self {
        Worker {
            thread: Some(thread::spawn(move || {
                loop {
                    let message = match receiver.lock().unwrap().recv() {
                        Ok(message) => message,
                        Err(_) => break,
                    };

                    match message {
                        Message::Work(job) => job(),
                        Message::Terminate => break,
                    }
                }
            })),
        }
    }
}

/// A counter-and-condvar barrier. Each in-flight job holds a [WaitGuard];
/// `wait()` blocks until every guard has dropped. This is the per-generation
/// "wait for all" barrier the engine relies on.
#[derive(Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

struct Inner {
    counter: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

pub struct WaitGuard {
    wg: WaitGroup,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.wg.inner.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.wg.inner.lock.lock().unwrap();
            self.wg.inner.cvar.notify_all();
        }
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                counter: AtomicUsize::new(0),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    pub fn guard(&self) -> WaitGuard {
        self.inner.counter.fetch_add(1, Ordering::AcqRel);
        WaitGuard { wg: self.clone() }
    }

    /// Blocks until the counter reaches zero.
    pub fn wait(&self) {
        if self.inner.counter.load(Ordering::Acquire) == 0 {
            return;
        }

        let lock = self.inner.lock.lock().unwrap();
        let _unused = self
            .inner
            .cvar
            .wait_while(lock, |_| self.inner.counter.load(Ordering::Acquire) != 0);
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}
