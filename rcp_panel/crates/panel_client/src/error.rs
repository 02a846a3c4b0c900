use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint {host}:{port}: {source}")]
    InvalidEndpoint {
        host: String,
        port: u16,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint {0} is not a websocket url")]
    NotWebSocket(String),
}
