use wiremock::{Mock, MockServer};

/// A local mock server usable from plain, non-async tests
///
/// wiremock serves on its own thread, so the blocking session under test can
/// talk to it while no runtime is active on the test thread.
pub struct TestServer {
    server: MockServer,
}

impl TestServer {
    pub fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        Self {
            server: tokio_test::block_on(MockServer::start()),
        }
    }

    pub fn mount(&self, mock: Mock) {
        tokio_test::block_on(mock.mount(&self.server));
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    pub fn port(&self) -> u16 {
        self.server.address().port()
    }

    pub fn verify(&self) {
        tokio_test::block_on(self.server.verify());
    }
}
