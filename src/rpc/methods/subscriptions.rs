// Event subscription methods.

use super::parse_params;
use crate::{
    error::ServiceError,
    events::Topic,
    rpc::{
        connection::Connection,
        dispatch::{AppState, HandlerFuture},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{str::FromStr, sync::Arc};
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
struct TopicsParams {
    topics: Vec<String>,
}

fn parse_topics(raw: &[String]) -> Result<Vec<Topic>, ServiceError> {
    raw.iter()
        .map(|topic| Topic::from_str(topic).map_err(|_| ServiceError::from_kind(crate::error::ErrorKind::InvalidOption)))
        .collect()
}

pub fn subscribe_events(
    _state: Arc<AppState>,
    connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: TopicsParams = parse_params(params)?;
        let topics = parse_topics(&params.topics)?;
        connection.subscribe(&topics);
        Ok(json!({ "subscribed": topics.iter().map(|t| t.as_str()).collect::<Vec<_>>() }))
    })
}

pub fn unsubscribe_events(
    _state: Arc<AppState>,
    connection: Arc<Connection>,
    params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let params: TopicsParams = parse_params(params)?;
        let topics = parse_topics(&params.topics)?;
        connection.unsubscribe(&topics);
        Ok(json!({ "unsubscribed": topics.iter().map(|t| t.as_str()).collect::<Vec<_>>() }))
    })
}

pub fn get_subscription_stats(
    state: Arc<AppState>,
    _connection: Arc<Connection>,
    _params: Value,
    _cancel: CancellationToken,
) -> HandlerFuture {
    Box::pin(async move {
        let stats = state.connections.stats();
        Ok(json!({
            "total_connections": stats.total_connections,
            "per_topic": stats.per_topic,
        }))
    })
}
