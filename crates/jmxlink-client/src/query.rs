//! Whole-pattern collection on top of the single-step calls.

use jmxlink_protocol::AttributeResponse;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::JmxClient;
use crate::error::{ClientError, ClientResult};

/// One collected entry, or the failure that prevented collecting it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryAttrResponse {
    /// An entry returned by the bridge (possibly an error-typed one)
    Collected(AttributeResponse),
    /// A bean or attribute that failed as a whole
    Failed {
        /// What failed and why
        status_msg: String,
    },
}

impl QueryAttrResponse {
    /// The collected entry, when it carries a value.
    pub fn valid(&self) -> Option<&AttributeResponse> {
        match self {
            Self::Collected(entry) if !entry.is_error() => Some(entry),
            _ => None,
        }
    }
}

/// Result of [`JmxClient::query_mbean`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse(pub Vec<QueryAttrResponse>);

impl QueryResponse {
    /// Entries that carry a value.
    pub fn valid_attributes(&self) -> impl Iterator<Item = &AttributeResponse> {
        self.0.iter().filter_map(QueryAttrResponse::valid)
    }

    /// Number of entries, failed or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> JmxClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Collect every attribute of every bean matching `pattern`, one call
    /// per attribute.
    ///
    /// Operational failures for a bean or attribute are recorded and
    /// collection moves on; anything else aborts.
    ///
    /// # Errors
    ///
    /// Failure to list beans, connection errors and transport errors.
    pub async fn query_mbean(&mut self, pattern: &str) -> ClientResult<QueryResponse> {
        let mut result = Vec::new();

        for bean in self.query_mbean_names(pattern).await? {
            let names = match self.get_mbean_attribute_names(&bean).await {
                Ok(names) => names,
                Err(ClientError::Jmx {
                    message,
                    cause_message,
                    stacktrace,
                }) => {
                    result.push(QueryAttrResponse::Failed {
                        status_msg: format!(
                            "error while querying mBean name: '{bean}', error message: {message}, error cause: {cause_message}, stacktrace: {stacktrace:?}"
                        ),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            for attribute in names {
                match self.get_mbean_attribute(&bean, &attribute).await {
                    Ok(entries) => {
                        result.extend(entries.into_iter().map(QueryAttrResponse::Collected));
                    }
                    Err(ClientError::Jmx {
                        message,
                        cause_message,
                        stacktrace,
                    }) => result.push(QueryAttrResponse::Failed {
                        status_msg: format!(
                            "error while querying mBean '{bean}', attribute: '{attribute}', error message: {message}, error cause: {cause_message}, stacktrace: {stacktrace:?}"
                        ),
                    }),
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(QueryResponse(result))
    }
}
