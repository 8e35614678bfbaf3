use std::error::Error;

use aws_sdk_ssm::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    operation::get_parameter::GetParameterError,
};
use aws_types::SdkConfig;
use tracing::debug;

use crate::storage::repository::{ParameterStore, StoreError};

const THROTTLING_CODES: &[&str] = &["ThrottlingException", "TooManyRequestsException"];
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "ExpiredTokenException",
    "InvalidKeyId",
];

/// AWS Systems Manager Parameter Store client.
#[derive(Clone)]
pub struct SsmStorage {
    client: Client,
}

impl SsmStorage {
    pub fn new(config: &SdkConfig) -> Self {
        Self::with_client(Client::new(config))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for SsmStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsmStorage")
            .field("region", &self.client.config().region())
            .finish()
    }
}

#[async_trait::async_trait]
impl ParameterStore for SsmStorage {
    async fn fetch(&self, name: &str, decrypt: bool) -> Result<Option<String>, StoreError> {
        debug!(parameter = name, decrypt, "Calling ssm:GetParameter");

        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await;

        match result {
            Ok(output) => output
                .parameter()
                .and_then(|p| p.value())
                .map(|v| Some(v.to_string()))
                .ok_or_else(|| {
                    StoreError::MalformedResponse("response contains no value".to_string())
                }),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found) =>
            {
                Ok(None)
            }
            Err(err) => Err(classify_error(&err)),
        }
    }
}

/// The caller adds the parameter name, so the message only describes the
/// failure itself.
fn classify_error<E, R>(err: &SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: std::fmt::Debug,
{
    let message = describe(err);

    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StoreError::ConnectionFailed(message)
        }
        SdkError::ResponseError(_) => StoreError::MalformedResponse(message),
        _ => match err.code() {
            Some(code) if THROTTLING_CODES.contains(&code) => StoreError::Throttled(message),
            Some(code) if ACCESS_DENIED_CODES.contains(&code) => StoreError::AccessDenied(message),
            _ => StoreError::QueryFailed(message),
        },
    }
}

fn describe<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + Error + 'static,
    R: std::fmt::Debug,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => {
            let mut text = err.to_string();
            let mut source = err.source();
            while let Some(cause) = source {
                text.push_str(": ");
                text.push_str(&cause.to_string());
                source = cause.source();
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_ssm::config::{BehaviorVersion, Config, Credentials, Region, retry::RetryConfig};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    /// Answers every request on a local port with the same canned response.
    async fn canned_endpoint(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                let reason = if status == 200 { "OK" } else { "Bad Request" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\n\
                     Content-Type: application/x-amz-json-1.1\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn storage(endpoint: String) -> SsmStorage {
        let config = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKID", "SECRET", None, None, "test"))
            .endpoint_url(endpoint)
            .retry_config(RetryConfig::disabled())
            .build();
        SsmStorage::with_client(Client::from_conf(config))
    }

    async fn fetch_with(status: u16, body: &'static str) -> Result<Option<String>, StoreError> {
        let store = storage(canned_endpoint(status, body).await);
        store.fetch("/app/db", true).await
    }

    #[tokio::test]
    async fn test_fetch_value() {
        let result = fetch_with(200, r#"{"Parameter":{"Name":"/app/db","Value":"v"}}"#).await;
        assert_eq!(result.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_parameter_not_found_is_absent() {
        let result = fetch_with(400, r#"{"__type":"ParameterNotFound"}"#).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_throttling_is_classified() {
        let body = r#"{"__type":"ThrottlingException","message":"Rate exceeded"}"#;
        let err = fetch_with(400, body).await.unwrap_err();

        assert_eq!(err, StoreError::Throttled("ThrottlingException: Rate exceeded".to_string()));
    }

    #[tokio::test]
    async fn test_access_denied_is_classified() {
        let err = fetch_with(400, r#"{"__type":"AccessDeniedException"}"#)
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::AccessDenied("AccessDeniedException".to_string()));
    }

    #[tokio::test]
    async fn test_other_service_error_is_query_failure() {
        let body = r#"{"__type":"InternalServerError","message":"boom"}"#;
        let err = fetch_with(400, body).await.unwrap_err();

        assert_eq!(err, StoreError::QueryFailed("InternalServerError: boom".to_string()));
    }

    #[tokio::test]
    async fn test_missing_value_is_malformed() {
        let err = fetch_with(200, r#"{"Parameter":{"Name":"/app/db"}}"#)
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::MalformedResponse("response contains no value".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = storage(format!("http://{}", addr))
            .fetch("/app/db", true)
            .await
            .unwrap_err();

        match err {
            StoreError::ConnectionFailed(message) => {
                assert!(!message.contains("/app/db"));
                assert!(!message.contains("DispatchFailure("));
            }
            other => panic!("expected a connection failure, got {:?}", other),
        }
    }
}
