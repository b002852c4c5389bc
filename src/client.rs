use crate::error::{SimpleTsdbError, SimpleTsdbResult};
use crate::line_protocol::{self, PointChunks, PointReader};
use crate::model::{
    DeleteDownsamplerRequest, DeletePointsRequest, Downsampler, InsertPointRequest, Point,
    QueryPointsRequest, ServerError,
};
use crate::ClientConfig;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Client for a SimpleTSDB server.
///
/// Every call is a single HTTP exchange. The client holds no state beyond
/// its configuration and the connection pool inside `reqwest::Client`, so it
/// is cheap to clone and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct SimpleTsdb {
    config: ClientConfig,
    base_url: String,
    client: reqwest::Client,
}

impl SimpleTsdb {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let config = ClientConfig::new(host, port);
        Self {
            base_url: config.base_url(),
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_config(config: ClientConfig) -> SimpleTsdbResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: config.base_url(),
            config,
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Streams `points` to `/insert_points` as line protocol.
    ///
    /// The body is encoded lazily in chunks of at most `chunk_size` bytes, so
    /// the full payload is never held in memory.
    pub async fn insert_points(&self, points: Vec<InsertPointRequest>) -> SimpleTsdbResult<()> {
        debug!("Inserting {} points", points.len());
        let chunks = PointChunks::new(PointReader::new(points), self.config.chunk_size);
        let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));

        let request = self
            .request(Method::POST, "/insert_points")
            .header(CONTENT_TYPE, line_protocol::CONTENT_TYPE)
            .body(body);
        self.execute(request, "/insert_points").await?;
        Ok(())
    }

    pub async fn insert_point(&self, point: InsertPointRequest) -> SimpleTsdbResult<()> {
        self.insert_points(vec![point]).await
    }

    pub async fn query_points(&self, query: &QueryPointsRequest) -> SimpleTsdbResult<Vec<Point>> {
        let body = self.send_json(Method::POST, "/query_points", query).await?;
        decode(&body)
    }

    pub async fn delete_points(&self, request: &DeletePointsRequest) -> SimpleTsdbResult<()> {
        self.send_json(Method::DELETE, "/delete_points", request).await?;
        Ok(())
    }

    pub async fn add_downsampler(&self, downsampler: &Downsampler) -> SimpleTsdbResult<()> {
        self.send_json(Method::POST, "/add_downsampler", downsampler).await?;
        Ok(())
    }

    /// Adds several downsamplers in one request. The server applies them as a
    /// unit from the client's point of view: there is no partial success.
    pub async fn add_downsamplers(&self, downsamplers: &[Downsampler]) -> SimpleTsdbResult<()> {
        self.send_json(Method::POST, "/add_downsamplers", downsamplers).await?;
        Ok(())
    }

    pub async fn list_downsamplers(&self) -> SimpleTsdbResult<Vec<Downsampler>> {
        let request = self.request(Method::GET, "/list_downsamplers");
        let body = self.execute(request, "/list_downsamplers").await?;
        decode(&body)
    }

    pub async fn delete_downsampler(&self, id: i64) -> SimpleTsdbResult<()> {
        let request = DeleteDownsamplerRequest { id };
        self.send_json(Method::DELETE, "/delete_downsampler", &request).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.config.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> SimpleTsdbResult<Bytes> {
        let body = serde_json::to_vec(payload)?;
        let request = self
            .request(method, path)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body);
        self.execute(request, path).await
    }

    /// Sends the request and maps the status code. The response body is
    /// always read to completion or dropped before returning.
    async fn execute(&self, request: RequestBuilder, path: &str) -> SimpleTsdbResult<Bytes> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} returned {}", path, status);

        match status {
            StatusCode::OK => Ok(response.bytes().await?),
            StatusCode::BAD_REQUEST => {
                let body = response.bytes().await?;
                let error: ServerError = serde_json::from_slice(&body)?;
                Err(SimpleTsdbError::BadRequest(error.error))
            }
            StatusCode::INTERNAL_SERVER_ERROR => Err(SimpleTsdbError::InternalServerError),
            other => Err(SimpleTsdbError::UnexpectedStatus(other.as_u16())),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> SimpleTsdbResult<T> {
    Ok(serde_json::from_slice(body)?)
}
