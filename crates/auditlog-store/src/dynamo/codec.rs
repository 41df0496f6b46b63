// ABOUTME: Conversion between Event records and DynamoDB attribute maps.
// ABOUTME: Dates are stored as fixed-width UTC RFC 3339 strings so the range key sorts chronologically.

use std::collections::{BTreeMap, HashMap};

use auditlog_core::Event;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use super::client::Item;
use super::{ATTR_DATE, ATTR_EXPIRATION, ATTR_ID, ATTR_METADATA, ATTR_STATUS_CODE, ATTR_STATUS_MESSAGE};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("missing attribute {0}")]
    Missing(&'static str),

    #[error("attribute {attribute} is not of type {expected}")]
    WrongType {
        attribute: &'static str,
        expected: &'static str,
    },

    #[error("attribute {attribute} has invalid number {value:?}")]
    InvalidNumber { attribute: &'static str, value: String },

    #[error("attribute date has invalid value {value:?}: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Storage form of a date: UTC, nanosecond precision, `Z` suffix. Every
/// value has the same width, so string order equals time order.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Key map addressing the record `id`.
pub fn key_for(id: &str) -> Item {
    HashMap::from([(ATTR_ID.to_string(), AttributeValue::S(id.to_string()))])
}

pub fn to_item(event: &Event) -> Item {
    let mut item = Item::new();
    item.insert(ATTR_ID.to_string(), AttributeValue::S(event.id.clone()));
    item.insert(ATTR_DATE.to_string(), AttributeValue::S(format_date(&event.date)));
    item.insert(
        ATTR_STATUS_CODE.to_string(),
        AttributeValue::N(event.status_code.to_string()),
    );
    item.insert(
        ATTR_STATUS_MESSAGE.to_string(),
        AttributeValue::S(event.status_message.clone()),
    );
    item.insert(
        ATTR_EXPIRATION.to_string(),
        AttributeValue::N(event.expiration.to_string()),
    );
    if !event.metadata.is_empty() {
        let metadata = event
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
            .collect();
        item.insert(ATTR_METADATA.to_string(), AttributeValue::M(metadata));
    }
    item
}

pub fn from_item(item: &Item) -> Result<Event, CodecError> {
    let id = string_attr(item, ATTR_ID)?.ok_or(CodecError::Missing(ATTR_ID))?;
    let date = match string_attr(item, ATTR_DATE)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|source| CodecError::InvalidDate {
                value: raw.clone(),
                source,
            })?
            .with_timezone(&Utc),
        None => return Err(CodecError::Missing(ATTR_DATE)),
    };
    let status_code = number_attr(item, ATTR_STATUS_CODE)?.unwrap_or(0);
    let status_message = string_attr(item, ATTR_STATUS_MESSAGE)?.unwrap_or_default();
    let expiration = number_attr(item, ATTR_EXPIRATION)?.unwrap_or(0);

    let mut metadata = BTreeMap::new();
    if let Some(value) = item.get(ATTR_METADATA) {
        let map = value.as_m().map_err(|_| CodecError::WrongType {
            attribute: ATTR_METADATA,
            expected: "M",
        })?;
        for (key, value) in map {
            let value = value.as_s().map_err(|_| CodecError::WrongType {
                attribute: ATTR_METADATA,
                expected: "M of S",
            })?;
            metadata.insert(key.clone(), value.clone());
        }
    }

    Ok(Event {
        id,
        date,
        status_code,
        status_message,
        expiration,
        metadata,
    })
}

fn string_attr(item: &Item, attribute: &'static str) -> Result<Option<String>, CodecError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CodecError::WrongType {
            attribute,
            expected: "S",
        }),
    }
}

fn number_attr(item: &Item, attribute: &'static str) -> Result<Option<i64>, CodecError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::N(n)) => {
            n.parse::<i64>()
                .map(Some)
                .map_err(|_| CodecError::InvalidNumber {
                    attribute,
                    value: n.clone(),
                })
        }
        Some(_) => Err(CodecError::WrongType {
            attribute,
            expected: "N",
        }),
    }
}
