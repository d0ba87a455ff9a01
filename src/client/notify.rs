use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A non-blocking, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Supplies the bearer token. Asked once per request; the result is never cached.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Option<String>;
}

#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn sign_out(&self);
}

/// Keeps every notice in order.
#[derive(Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Counts sign-outs instead of tearing anything down.
#[derive(Default)]
pub struct SignOutFlag {
    count: Mutex<u32>,
}

impl SignOutFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_out(&self) -> u32 {
        *self.count.lock()
    }
}

#[async_trait]
impl SessionHandler for SignOutFlag {
    async fn sign_out(&self) {
        *self.count.lock() += 1;
    }
}
