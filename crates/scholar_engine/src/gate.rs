/// Answers whether the current operator may run crawl jobs.
pub trait AccessGate: Send + Sync {
    fn authorize(&self) -> bool;
}

/// Fixed answer, for deployments without a license check and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGate {
    allowed: bool,
}

impl StaticGate {
    pub fn allow() -> Self {
        Self { allowed: true }
    }

    pub fn deny() -> Self {
        Self { allowed: false }
    }
}

impl AccessGate for StaticGate {
    fn authorize(&self) -> bool {
        self.allowed
    }
}

impl<F> AccessGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn authorize(&self) -> bool {
        self()
    }
}
