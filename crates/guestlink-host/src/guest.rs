use std::future::Future;

use guestlink_frame::ExecResult;

use crate::error::Result;
use crate::host::VsockHost;

/// Operations a caller needs from a booted guest, independent of how the
/// host reaches it.
pub trait GuestTransport: Send + Sync {
    fn exec(&self, command: &str) -> impl Future<Output = ExecResult> + Send;

    fn exec_checked(&self, command: &str) -> impl Future<Output = Result<ExecResult>> + Send;

    fn write_file(&self, path: &str, content: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn write_file_with_sudo(
        &self,
        path: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    fn read_file(&self, path: &str) -> impl Future<Output = Result<String>> + Send;

    fn mkdir(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    fn exists(&self, path: &str) -> impl Future<Output = bool> + Send;

    fn is_reachable(&self) -> impl Future<Output = bool> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl GuestTransport for VsockHost {
    async fn exec(&self, command: &str) -> ExecResult {
        VsockHost::exec(self, command).await
    }

    async fn exec_checked(&self, command: &str) -> Result<ExecResult> {
        VsockHost::exec_checked(self, command).await
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        VsockHost::write_file(self, path, content).await
    }

    async fn write_file_with_sudo(&self, path: &str, content: &[u8]) -> Result<()> {
        VsockHost::write_file_with_sudo(self, path, content).await
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        VsockHost::read_file(self, path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        VsockHost::mkdir(self, path).await
    }

    async fn exists(&self, path: &str) -> bool {
        VsockHost::exists(self, path).await
    }

    async fn is_reachable(&self) -> bool {
        VsockHost::is_reachable(self).await
    }

    async fn close(&self) {
        VsockHost::close(self).await
    }
}
