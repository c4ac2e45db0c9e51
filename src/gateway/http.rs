//! Blocking HTTP gateway.
//!
//! Record pages and transaction headers go through the gateway's GraphQL
//! endpoint; payloads come from the raw data endpoint and the chain head
//! from `/info`. Timeouts are configured per client; retry policy belongs
//! to the caller.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::core::protocol;
use crate::core::{Address, BlockId, BlockRef, InteractionRecord, Tag, Tags, TxId, Winston};

use super::{Gateway, GatewayError, PageRequest, RecordEdge, RecordPage, TxHeader};

const RECORDS_QUERY: &str = r#"query Transactions($tags: [TagFilter!]!, $blockFilter: BlockFilter!, $first: Int!, $after: String) {
  transactions(tags: $tags, block: $blockFilter, first: $first, sort: HEIGHT_ASC, after: $after) {
    pageInfo {
      hasNextPage
    }
    edges {
      node {
        id
        owner { address }
        recipient
        tags {
          name
          value
        }
        block {
          height
          id
          timestamp
        }
        fee { winston }
        quantity { winston }
        parent { id }
      }
      cursor
    }
  }
}"#;

const TX_QUERY: &str = r#"query Transaction($id: ID!) {
  transaction(id: $id) {
    id
    owner { address }
    tags {
      name
      value
    }
  }
}"#;

pub struct HttpGateway {
    base: String,
    client: reqwest::blocking::Client,
}

impl HttpGateway {
    /// Build a gateway client for `base_url` (e.g. `https://arweave.net`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                url: base_url.to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.base)
    }

    fn post_graphql<T: for<'de> Deserialize<'de>>(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = self.graphql_url();
        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .map_err(|e| GatewayError::Transport {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let envelope: GraphqlEnvelope<T> =
            response.json().map_err(|e| GatewayError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if let Some(errors) = envelope.errors {
            return Err(GatewayError::Decode {
                url,
                reason: errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }

        envelope.data.ok_or(GatewayError::Decode {
            url,
            reason: "response carried neither data nor errors".into(),
        })
    }
}

impl Gateway for HttpGateway {
    fn head_height(&self) -> Result<u64, GatewayError> {
        let url = format!("{}/info", self.base);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| GatewayError::Transport {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let info: NetworkInfo = response.json().map_err(|e| GatewayError::Decode {
            url,
            reason: e.to_string(),
        })?;
        Ok(info.height)
    }

    fn transaction(&self, id: &TxId) -> Result<Option<TxHeader>, GatewayError> {
        let data: TxData = self.post_graphql(TX_QUERY, json!({ "id": id.as_str() }))?;
        let Some(node) = data.transaction else {
            return Ok(None);
        };
        let header = node.into_header().map_err(|reason| GatewayError::Decode {
            url: self.graphql_url(),
            reason,
        })?;
        Ok(Some(header))
    }

    fn payload(&self, id: &TxId) -> Result<Bytes, GatewayError> {
        let url = format!("{}/{}", self.base, id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| GatewayError::Transport {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response.bytes().map_err(|e| GatewayError::Transport {
            url,
            source: Box::new(e),
        })
    }

    fn interactions_page(&self, request: &PageRequest) -> Result<RecordPage, GatewayError> {
        let variables = json!({
            "tags": [
                { "name": protocol::TAG_APP_NAME, "values": [protocol::APP_ACTION] },
                { "name": protocol::TAG_CONTRACT, "values": [request.contract.as_str()] },
            ],
            "blockFilter": { "min": request.min_height, "max": request.max_height },
            "first": request.page_size,
            "after": request.cursor.clone(),
        });

        let data: TransactionsData = self.post_graphql(RECORDS_QUERY, variables)?;
        let connection = data.transactions;

        let mut edges = Vec::with_capacity(connection.edges.len());
        for edge in connection.edges {
            let cursor = edge.cursor;
            let parent = edge.node.parent.as_ref().map(|p| p.id.clone());
            match edge.node.into_record() {
                Ok(Some(record)) => edges.push(RecordEdge {
                    cursor,
                    parent,
                    record,
                }),
                // Node without a confirmed block: excluded by the block
                // filter upstream, tolerated here.
                Ok(None) => {
                    tracing::debug!(cursor = %cursor, "skipping unconfirmed node in page");
                }
                Err(reason) => {
                    return Err(GatewayError::Decode {
                        url: self.graphql_url(),
                        reason,
                    });
                }
            }
        }

        Ok(RecordPage {
            edges,
            has_next_page: connection.page_info.has_next_page,
        })
    }
}

#[derive(Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct NetworkInfo {
    height: u64,
}

#[derive(Deserialize)]
struct TxData {
    transaction: Option<TxNode>,
}

#[derive(Deserialize)]
struct TxNode {
    id: String,
    owner: OwnerNode,
    #[serde(default)]
    tags: Vec<TagNode>,
}

impl TxNode {
    fn into_header(self) -> Result<TxHeader, String> {
        Ok(TxHeader {
            id: TxId::parse(self.id).map_err(|e| e.to_string())?,
            owner: Address::parse(self.owner.address).map_err(|e| e.to_string())?,
            tags: self
                .tags
                .into_iter()
                .map(|t| Tag::new(t.name, t.value))
                .collect(),
        })
    }
}

#[derive(Deserialize)]
struct TransactionsData {
    transactions: ConnectionNode,
}

#[derive(Deserialize)]
struct ConnectionNode {
    #[serde(rename = "pageInfo")]
    page_info: PageInfoNode,
    #[serde(default)]
    edges: Vec<EdgeNode>,
}

#[derive(Deserialize)]
struct PageInfoNode {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct EdgeNode {
    cursor: String,
    node: RecordNode,
}

#[derive(Deserialize)]
struct RecordNode {
    id: String,
    owner: OwnerNode,
    #[serde(default)]
    recipient: String,
    #[serde(default)]
    tags: Vec<TagNode>,
    block: Option<BlockNode>,
    fee: AmountNode,
    quantity: AmountNode,
    parent: Option<ParentNode>,
}

impl RecordNode {
    fn into_record(self) -> Result<Option<InteractionRecord>, String> {
        let Some(block) = self.block else {
            return Ok(None);
        };
        let recipient = if self.recipient.is_empty() {
            None
        } else {
            Some(Address::parse(self.recipient).map_err(|e| e.to_string())?)
        };
        Ok(Some(InteractionRecord {
            id: TxId::parse(self.id).map_err(|e| e.to_string())?,
            owner: Address::parse(self.owner.address).map_err(|e| e.to_string())?,
            recipient,
            tags: self
                .tags
                .into_iter()
                .map(|t| Tag::new(t.name, t.value))
                .collect(),
            fee: Winston::new(self.fee.winston).map_err(|e| e.to_string())?,
            quantity: Winston::new(self.quantity.winston).map_err(|e| e.to_string())?,
            block: BlockRef {
                height: block.height,
                id: BlockId::parse(block.id).map_err(|e| e.to_string())?,
                timestamp: block.timestamp,
            },
        }))
    }
}

#[derive(Deserialize)]
struct OwnerNode {
    address: String,
}

#[derive(Deserialize)]
struct TagNode {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct BlockNode {
    height: u64,
    id: String,
    #[serde(default)]
    timestamp: u64,
}

#[derive(Deserialize)]
struct ParentNode {
    id: String,
}

#[derive(Deserialize)]
struct AmountNode {
    winston: String,
}
