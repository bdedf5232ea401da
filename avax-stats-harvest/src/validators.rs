//! Validator stats harvesting from the Avascan REST API.
//!
//! Pages of the staking validations listing are requested one after the
//! other, each carrying the cursor returned by the previous one, until the
//! page limit is reached or a response has no `nextToken`.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use avax_stats::flat::COLUMNS;
use avax_stats::networks::PRIMARY_NETWORK_ID;
use avax_stats::{FlatValidation, Network, Status, Validation, ValidationsPage};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;
use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::table::Table;

/// Per-request timeout for API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How many pages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    /// Follow cursors until the last page (`-1` on the command line).
    Unlimited,
    /// Fetch at most this many pages.
    Pages(u32),
}

impl Default for PageLimit {
    fn default() -> Self {
        Self::Pages(1)
    }
}

impl PageLimit {
    /// Whether page number `page` (1-based) may be fetched.
    #[must_use]
    pub const fn allows(self, page: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Pages(n) => page <= n,
        }
    }
}

impl FromStr for PageLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(-1) => Ok(Self::Unlimited),
            Ok(n) if n >= 1 => u32::try_from(n)
                .map(Self::Pages)
                .map_err(|_| format!("page count {n} is too large")),
            Ok(n) => Err(format!("page count must be -1 or at least 1, got {n}")),
            Err(e) => Err(format!("invalid page count `{s}`: {e}")),
        }
    }
}

impl fmt::Display for PageLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("all"),
            Self::Pages(n) => write!(f, "{n}"),
        }
    }
}

/// Read access to the validations listing of one network.
pub trait ValidationSource {
    /// Fetch one page; `next` is the cursor from the previous page.
    fn page(
        &self,
        status: Status,
        next: Option<&str>,
    ) -> impl Future<Output = Result<ValidationsPage, FetchError>> + Send;
}

/// [`ValidationSource`] backed by the Avascan HTTP API.
#[derive(Debug, Clone)]
pub struct AvascanClient {
    http: reqwest::Client,
    url: Url,
}

impl AvascanClient {
    /// Client for the validations listing of `network` under `api_base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_base` is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(api_base: &str, network: Network) -> Result<Self> {
        let mut base =
            Url::parse(api_base).with_context(|| format!("invalid API URL: {api_base}"))?;
        ensure!(!base.cannot_be_a_base(), "invalid API URL: {api_base}");
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base
            .join(&network.validations_path())
            .with_context(|| format!("invalid API URL: {api_base}"))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, url })
    }

    /// Endpoint queried by [`ValidationSource::page`].
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl ValidationSource for AvascanClient {
    async fn page(
        &self,
        status: Status,
        next: Option<&str>,
    ) -> Result<ValidationsPage, FetchError> {
        let mut query = vec![("status", status.as_str()), ("subnetIds", PRIMARY_NETWORK_ID)];
        if let Some(token) = next {
            query.push(("next", token));
        }

        let res = self.http.get(self.url.clone()).query(&query).send().await?;
        tracing::debug!(url = %res.url(), "API call");

        let code = res.status();
        let body = res.text().await?;
        if !code.is_success() {
            return Err(FetchError::from_status(code.as_u16(), body));
        }
        ValidationsPage::from_json(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Progress of a validators harvest, persisted in checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorsState {
    /// Harvested network.
    pub network: Network,
    /// Status filter.
    pub status: Status,
    /// Number of the next page to fetch (1-based).
    pub page: u32,
    /// Cursor of the next page; `None` before the first request.
    pub next_token: Option<String>,
    /// Validations fetched so far, in API order.
    pub items: Vec<Validation>,
}

impl ValidatorsState {
    const fn fresh(network: Network, status: Status) -> Self {
        Self {
            network,
            status,
            page: 1,
            next_token: None,
            items: Vec::new(),
        }
    }
}

fn resume(
    network: Network,
    status: Status,
    checkpoint: Option<&Checkpoint>,
) -> Result<ValidatorsState> {
    let fresh = ValidatorsState::fresh(network, status);
    let Some(cp) = checkpoint else {
        return Ok(fresh);
    };
    match cp.load::<ValidatorsState>()? {
        Some(saved) if saved.network == network && saved.status == status => Ok(saved),
        Some(_) => {
            tracing::warn!(
                path = %cp.path().display(),
                "checkpoint is for another harvest, starting fresh"
            );
            Ok(fresh)
        }
        None => Ok(fresh),
    }
}

/// Fetch validations page by page.
///
/// Stops once `pages` pages have been fetched or a page carries no cursor,
/// whichever comes first; at least one page is always requested on a fresh
/// run. A request that still fails after `retry` aborts the harvest.
///
/// # Errors
///
/// Returns an error if a page cannot be fetched or decoded, or the
/// checkpoint cannot be written.
pub async fn harvest<S: ValidationSource>(
    source: &S,
    network: Network,
    status: Status,
    pages: PageLimit,
    retry: &RetryPolicy,
    checkpoint: Option<&Checkpoint>,
) -> Result<Vec<Validation>> {
    let mut state = resume(network, status, checkpoint)?;
    tracing::info!(%network, %status, %pages, from_page = state.page, "fetching validators stats");

    while pages.allows(state.page) {
        let token = state.next_token.clone();
        let page = retry
            .run("validations", || source.page(status, token.as_deref()))
            .await
            .with_context(|| format!("fetching page {}", state.page))?;

        tracing::info!(page = state.page, %pages, items = page.items.len(), "page fetched");
        state.items.extend(page.items);

        let Some(next) = page.link.next_token else {
            break;
        };
        state.next_token = Some(next);
        state.page += 1;
        if let Some(cp) = checkpoint {
            cp.save(&state)?;
        }
    }

    tracing::info!(total = state.items.len(), "validators stats fetched");
    Ok(state.items)
}

/// Flatten `items` under the fixed validator header.
///
/// # Errors
///
/// Returns an error if a flattened row does not fit the header.
pub fn to_table(items: &[Validation]) -> Result<Table> {
    let mut table = Table::new(COLUMNS);
    for v in items {
        let flat = FlatValidation::from(v);
        table.push(flat.values().iter().map(|s| Some((*s).to_owned())).collect())?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use std::sync::Arc;

    use avax_stats::Link;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::table::{self, OutputFormat};

    struct FakeApi {
        pages: Mutex<VecDeque<Result<ValidationsPage, FetchError>>>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl FakeApi {
        fn new(pages: Vec<Result<ValidationsPage, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ValidationSource for FakeApi {
        async fn page(
            &self,
            _status: Status,
            next: Option<&str>,
        ) -> Result<ValidationsPage, FetchError> {
            self.calls.lock().unwrap().push(next.map(str::to_owned));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::NotFound("no more pages".into())))
        }
    }

    fn item(node: &str) -> Validation {
        serde_json::from_value(item_json(node)).unwrap()
    }

    fn item_json(node: &str) -> serde_json::Value {
        serde_json::json!({
            "nodeId": node,
            "subnetId": PRIMARY_NETWORK_ID,
            "name": "oonodz",
            "beneficiaries": ["P-avax1a", "P-avax1b"],
            "startTime": "2023-05-15T20:34:15.000Z",
            "endTime": "2023-06-17T19:00:56.000Z",
            "assetId": "FvwEAhmxKfeiG8SnEvq42hc6whRyY3EFYAvebMqDNDGCgxN5Z",
            "stake": {
                "fromSelf": "2000",
                "fromDelegations": "0",
                "total": "2000",
                "networkShare": 0.5
            },
            "rewards": { "fromSelf": "12", "fromDelegations": "0", "total": "12" },
            "delegations": {
                "count": 3,
                "delegationFee": 0.02,
                "maxYield": 0.1,
                "availableDelegationCapacity": "8000",
                "totalDelegationCapacity": "10000",
                "grossDelegationReward": "0",
                "netDelegationReward": "0"
            },
            "node": {
                "avgUptime": 0.99,
                "responsiveness": { "checksCount": 14, "positiveChecksCount": 13 },
                "location": { "country": "France" }
            }
        })
    }

    fn page(nodes: &[&str], next: Option<&str>) -> Result<ValidationsPage, FetchError> {
        Ok(ValidationsPage {
            items: nodes.iter().map(|n| item(n)).collect(),
            link: Link {
                next: next.map(|t| format!("/v2/network/mainnet/staking/validations?next={t}")),
                next_token: next.map(str::to_owned),
            },
        })
    }

    /// Answer one HTTP request per entry of `responses` on a local port.
    /// Returns the base URL and the request targets seen so far.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head: Vec<u8> = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&head);
                let target = request.split_whitespace().nth(1).unwrap_or_default();
                log.lock().unwrap().push(target.to_owned());

                let reply = format!(
                    "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn no_retry() -> RetryPolicy {
        RetryPolicy::fail_fast()
    }

    #[test]
    fn parses_page_limits() {
        assert_eq!("-1".parse::<PageLimit>(), Ok(PageLimit::Unlimited));
        assert_eq!("1".parse::<PageLimit>(), Ok(PageLimit::Pages(1)));
        assert_eq!("5".parse::<PageLimit>(), Ok(PageLimit::Pages(5)));
        assert!("0".parse::<PageLimit>().is_err(), "zero pages accepted");
        assert!("-2".parse::<PageLimit>().is_err(), "-2 accepted");
        assert!("many".parse::<PageLimit>().is_err(), "text accepted");
    }

    #[test]
    fn client_url_joins_network_path() {
        let client = AvascanClient::new("https://api-beta.avascan.info", Network::Mainnet).unwrap();
        assert_eq!(
            client.url().as_str(),
            "https://api-beta.avascan.info/v2/network/mainnet/staking/validations"
        );
        let client = AvascanClient::new("http://localhost:8080/proxy", Network::Testnet).unwrap();
        assert_eq!(
            client.url().as_str(),
            "http://localhost:8080/proxy/v2/network/testnet/staking/validations"
        );
    }

    #[tokio::test]
    async fn single_page_two_items() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::new(vec![page(&["NodeID-A", "NodeID-B"], None)]);

        let items = harvest(
            &api,
            Network::Mainnet,
            Status::Active,
            PageLimit::Pages(1),
            &no_retry(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(api.calls(), vec![None]);

        let path = dir.path().join("output/validators-stats.csv");
        table::write(&path, &to_table(&items).unwrap(), OutputFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COLUMNS.join(","));
        assert!(
            lines[1].starts_with(concat!(
                "NodeID-A,11111111111111111111111111111111LpoYY,oonodz,,,",
                "\"['P-avax1a', 'P-avax1b']\","
            )),
            "{}",
            lines[1]
        );
        assert!(lines[2].ends_with(",0.99,14,13,,,,,France"), "{}", lines[2]);
    }

    #[tokio::test]
    async fn unlimited_follows_cursors_to_the_end() {
        let api = FakeApi::new(vec![
            page(&["NodeID-A"], Some("t1")),
            page(&["NodeID-B"], Some("t2")),
            page(&["NodeID-C"], None),
        ]);

        let items = harvest(
            &api,
            Network::Mainnet,
            Status::Active,
            PageLimit::Unlimited,
            &no_retry(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(api.calls(), vec![None, Some("t1".into()), Some("t2".into())]);
        let nodes: Vec<_> = items.iter().map(|v| v.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["NodeID-A", "NodeID-B", "NodeID-C"]);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let api = FakeApi::new(vec![
            page(&["NodeID-A"], Some("t1")),
            page(&["NodeID-B"], Some("t2")),
            page(&["NodeID-C"], Some("t3")),
        ]);

        let items = harvest(
            &api,
            Network::Testnet,
            Status::Pending,
            PageLimit::Pages(2),
            &no_retry(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(api.calls().len(), 2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_fatal() {
        let api = FakeApi::new(vec![
            page(&["NodeID-A"], Some("t1")),
            Err(FetchError::from_status(400, r#"{"error":"bad token"}"#.into())),
        ]);
        let retry = RetryPolicy {
            attempts: 3,
            backoff_ms: vec![0],
        };

        let err = harvest(
            &api,
            Network::Mainnet,
            Status::Active,
            PageLimit::Unlimited,
            &retry,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(api.calls().len(), 2);
        assert!(format!("{err:#}").contains("bad token"), "{err:#}");
        assert!(format!("{err:#}").contains("page 2"), "{err:#}");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let api = FakeApi::new(vec![
            Err(FetchError::from_status(503, "busy".into())),
            page(&["NodeID-A"], None),
        ]);
        let retry = RetryPolicy {
            attempts: 2,
            backoff_ms: vec![0],
        };

        let items = harvest(
            &api,
            Network::Mainnet,
            Status::Active,
            PageLimit::Pages(1),
            &retry,
            None,
        )
        .await
        .unwrap();
        assert_eq!(api.calls(), vec![None, None]);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn resumes_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("validators.json"));
        cp.save(&ValidatorsState {
            network: Network::Mainnet,
            status: Status::Active,
            page: 2,
            next_token: Some("t1".into()),
            items: vec![item("NodeID-A")],
        })
        .unwrap();

        let api = FakeApi::new(vec![page(&["NodeID-B"], None)]);
        let items = harvest(
            &api,
            Network::Mainnet,
            Status::Active,
            PageLimit::Unlimited,
            &no_retry(),
            Some(&cp),
        )
        .await
        .unwrap();

        assert_eq!(api.calls(), vec![Some("t1".into())]);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn checkpoint_for_other_status_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Checkpoint::new(dir.path().join("validators.json"));
        cp.save(&ValidatorsState {
            network: Network::Mainnet,
            status: Status::Pending,
            page: 4,
            next_token: Some("t3".into()),
            items: Vec::new(),
        })
        .unwrap();

        let api = FakeApi::new(vec![page(&["NodeID-A"], None)]);
        harvest(&api, Network::Mainnet, Status::Active, PageLimit::Pages(1), &no_retry(), Some(&cp))
            .await
            .unwrap();
        assert_eq!(api.calls(), vec![None]);
    }

    #[tokio::test]
    async fn client_sends_status_subnet_and_cursor() {
        let first = serde_json::json!({
            "items": [item_json("NodeID-A")],
            "link": { "next": "/v2/network/testnet/staking/validations?next=t1", "nextToken": "t1" }
        });
        let second = serde_json::json!({ "items": [item_json("NodeID-B")] });
        let (base, seen) =
            serve(vec![(200, first.to_string()), (200, second.to_string())]).await;

        let client = AvascanClient::new(&base, Network::Testnet).unwrap();
        let items = harvest(
            &client,
            Network::Testnet,
            Status::Pending,
            PageLimit::Unlimited,
            &no_retry(),
            None,
        )
        .await
        .unwrap();

        let nodes: Vec<_> = items.iter().map(|v| v.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["NodeID-A", "NodeID-B"]);
        let path = "/v2/network/testnet/staking/validations";
        let subnet = format!("subnetIds={PRIMARY_NETWORK_ID}");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                format!("{path}?status=pending&{subnet}"),
                format!("{path}?status=pending&{subnet}&next=t1"),
            ]
        );
    }

    #[tokio::test]
    async fn client_reports_error_body() {
        let (base, _) = serve(vec![(400, r#"{"error":"invalid status"}"#.to_owned())]).await;
        let client = AvascanClient::new(&base, Network::Mainnet).unwrap();

        let err = client.page(Status::Active, None).await.unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"error":"invalid status"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_harvest_has_fixed_header() {
        let table = to_table(&[]).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.columns().len(), COLUMNS.len());
    }
}
