//! Minimal WebHDFS REST client (`/webhdfs/v1`), enough to write partitions
//! and read them back.
//!
//! `CREATE` and `OPEN` are two-step: the namenode answers with a redirect to a
//! datanode, which is followed by hand so the body is only sent once.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, Method, Response, StatusCode, Url, header, redirect};
use serde::Deserialize;
use snafu::ResultExt;

use crate::io::storage::{
    ClientBuildSnafu, HttpSnafu, InvalidUrlSnafu, NotFoundSnafu, Storage, StorageError,
    WebHdfsSnafu,
};

#[derive(Debug, Clone)]
pub struct WebHdfsStorage {
    client: Client,
    base_url: Url,
    user: Option<String>,
}

#[derive(Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: FileStatus,
}

#[derive(Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus")]
    file_status: Vec<FileStatus>,
}

#[derive(Deserialize)]
struct FileStatus {
    #[serde(rename = "pathSuffix", default)]
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
}

fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl WebHdfsStorage {
    /// `base_url` is the namenode HTTP address, e.g. `http://namenode:9870`.
    pub fn new(base_url: &str, user: Option<&str>) -> Result<Self, StorageError> {
        let parsed = Url::parse(base_url).map_err(|e| {
            InvalidUrlSnafu {
                url: base_url,
                message: e.to_string(),
            }
            .build()
        })?;
        if parsed.cannot_be_a_base() {
            return InvalidUrlSnafu {
                url: base_url,
                message: "not a base URL",
            }
            .fail();
        }
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            base_url: parsed,
            user: user.map(str::to_string),
        })
    }

    /// Namenode URL for `op` on `path`. Path segments and query values are
    /// percent-encoded.
    pub fn op_url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["webhdfs", "v1"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
            for (k, v) in extra {
                query.append_pair(k, v);
            }
        }
        url
    }

    async fn send<U: IntoUrl>(
        &self,
        method: Method,
        url: U,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, StorageError> {
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(body);
        }
        req.send().await.context(HttpSnafu { path })
    }

    async fn expect_ok(
        op: &'static str,
        path: &str,
        resp: Response,
        ok: StatusCode,
    ) -> Result<Response, StorageError> {
        let status = resp.status();
        if status == ok {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return NotFoundSnafu { path }.fail();
        }
        let message = resp.text().await.unwrap_or_default();
        WebHdfsSnafu {
            op,
            path,
            status: status.as_u16(),
            message,
        }
        .fail()
    }

    fn redirect_target(resp: &Response) -> Option<String> {
        if !resp.status().is_redirection() {
            return None;
        }
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn file_status(&self, path: &str) -> Result<Option<FileStatus>, StorageError> {
        let url = self.op_url(path, "GETFILESTATUS", &[]);
        let resp = self.send(Method::GET, url, path, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::expect_ok("GETFILESTATUS", path, resp, StatusCode::OK).await?;
        let body: FileStatusResponse = resp.json().await.context(HttpSnafu { path })?;
        Ok(Some(body.file_status))
    }
}

#[async_trait]
impl Storage for WebHdfsStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some((parent, _)) = absolute(path).rsplit_once('/') {
            if !parent.is_empty() {
                let url = self.op_url(parent, "MKDIRS", &[]);
                let resp = self.send(Method::PUT, url, parent, None).await?;
                Self::expect_ok("MKDIRS", parent, resp, StatusCode::OK).await?;
            }
        }

        let url = self.op_url(path, "CREATE", &[("overwrite", "true")]);
        let resp = self.send(Method::PUT, url, path, None).await?;
        let resp = match Self::redirect_target(&resp) {
            Some(location) => {
                self.send(Method::PUT, &location, path, Some(bytes.to_vec()))
                    .await?
            }
            None => resp,
        };
        Self::expect_ok("CREATE", path, resp, StatusCode::CREATED).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.file_status(path).await?.is_some())
    }

    async fn is_dir(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self
            .file_status(path)
            .await?
            .is_some_and(|s| s.kind == "DIRECTORY"))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.op_url(path, "OPEN", &[]);
        let resp = self.send(Method::GET, url, path, None).await?;
        let resp = match Self::redirect_target(&resp) {
            Some(location) => self.send(Method::GET, &location, path, None).await?,
            None => resp,
        };
        let resp = Self::expect_ok("OPEN", path, resp, StatusCode::OK).await?;
        let bytes = resp.bytes().await.context(HttpSnafu { path })?;
        Ok(bytes.to_vec())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let url = self.op_url(dir, "LISTSTATUS", &[]);
        let resp = self.send(Method::GET, url, dir, None).await?;
        let resp = Self::expect_ok("LISTSTATUS", dir, resp, StatusCode::OK).await?;
        let body: ListStatusResponse = resp.json().await.context(HttpSnafu { path: dir })?;

        let dir = absolute(dir);
        let dir = dir.trim_end_matches('/');
        let mut files: Vec<String> = body
            .file_statuses
            .file_status
            .into_iter()
            .filter(|s| s.kind == "FILE")
            .map(|s| format!("{dir}/{}", s.path_suffix))
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_urls_carry_user_and_extras() {
        let hdfs = WebHdfsStorage::new("http://namenode:9870/", Some("etl")).unwrap();
        assert_eq!(
            hdfs.op_url("data/2023/01/03/x.csv", "CREATE", &[("overwrite", "true")])
                .as_str(),
            "http://namenode:9870/webhdfs/v1/data/2023/01/03/x.csv?op=CREATE&user.name=etl&overwrite=true"
        );

        let anon = WebHdfsStorage::new("http://namenode:9870", None).unwrap();
        assert_eq!(
            anon.op_url("/data", "LISTSTATUS", &[]).as_str(),
            "http://namenode:9870/webhdfs/v1/data?op=LISTSTATUS"
        );
    }

    #[test]
    fn op_urls_escape_reserved_characters() {
        let hdfs = WebHdfsStorage::new("http://namenode:9870", Some("etl&admin=1")).unwrap();
        let url = hdfs.op_url("/data/100%#1 x/a.csv", "OPEN", &[]);

        assert_eq!(url.path(), "/webhdfs/v1/data/100%25%231%20x/a.csv");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("op".to_string(), "OPEN".to_string()),
                ("user.name".to_string(), "etl&admin=1".to_string()),
            ]
        );
        assert!(url.fragment().is_none());
    }

    #[test]
    fn base_url_keeps_its_own_path_prefix() {
        let hdfs = WebHdfsStorage::new("https://gateway/hdfs/", None).unwrap();
        assert_eq!(
            hdfs.op_url("data", "MKDIRS", &[]).as_str(),
            "https://gateway/hdfs/webhdfs/v1/data?op=MKDIRS"
        );
    }

    #[test]
    fn unusable_base_url_is_rejected() {
        let err = WebHdfsStorage::new("not a url", None).unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }

    #[test]
    fn list_status_payload_parses() {
        let body = r#"{"FileStatuses":{"FileStatus":[
            {"pathSuffix":"a.csv","type":"FILE","length":10},
            {"pathSuffix":"sub","type":"DIRECTORY","length":0}
        ]}}"#;
        let parsed: ListStatusResponse = serde_json::from_str(body).unwrap();
        let kinds: Vec<&str> = parsed
            .file_statuses
            .file_status
            .iter()
            .map(|s| s.kind.as_str())
            .collect();
        assert_eq!(kinds, ["FILE", "DIRECTORY"]);
    }
}
