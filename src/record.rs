//! Logical rows and their text encoding.
//!
//! A record encodes as `id|tombstone|key1:value1;key2:value2;...;` with the
//! attributes in key order. Separators are not escaped: keys or values
//! containing `|`, `:`, `;` or a newline cannot be encoded faithfully, see
//! [`Record::reserved_key`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const FIELD_SEP: char = '|';
const PAIR_SEP: char = ';';
const KV_SEP: char = ':';
const RESERVED: [char; 4] = [FIELD_SEP, PAIR_SEP, KV_SEP, '\n'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: u64,
    attributes: BTreeMap<String, String>,
    deleted: bool,
}

impl Record {
    pub fn new(id: u64, attributes: BTreeMap<String, String>) -> Self {
        Self {
            id,
            attributes,
            deleted: false,
        }
    }

    /// Builds a record from `(key, value)` pairs. Later duplicates win.
    pub fn from_pairs<K, V>(id: u64, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let attributes = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(id, attributes)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Tombstones the record. There is no way back.
    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Returns the first attribute key whose key or value would corrupt the
    /// encoding, if any.
    pub fn reserved_key(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, v)| k.contains(RESERVED) || v.contains(RESERVED))
            .map(|(k, _)| k.as_str())
    }

    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}{}{}{}",
            self.id,
            FIELD_SEP,
            if self.deleted { '1' } else { '0' },
            FIELD_SEP
        );
        for (key, value) in &self.attributes {
            out.push_str(key);
            out.push(KV_SEP);
            out.push_str(value);
            out.push(PAIR_SEP);
        }
        out
    }

    pub fn encoded_len(&self) -> usize {
        let digits = self.id.to_string().len();
        let attrs: usize = self
            .attributes
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2)
            .sum();
        digits + 3 + attrs
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let mut fields = encoded.splitn(3, FIELD_SEP);
        let id_field = fields.next().unwrap_or_default();
        let (Some(deleted_field), Some(data)) = (fields.next(), fields.next()) else {
            return Err(Error::MalformedEncoding(format!(
                "missing field separator in {:?}",
                encoded
            )));
        };

        let id = id_field
            .parse::<u64>()
            .map_err(|_| Error::MalformedEncoding(format!("invalid record id {:?}", id_field)))?;
        let deleted = match deleted_field {
            "0" => false,
            "1" => true,
            other => {
                return Err(Error::MalformedEncoding(format!(
                    "invalid tombstone flag {:?}",
                    other
                )))
            }
        };

        let mut attributes = BTreeMap::new();
        for pair in data.split(PAIR_SEP).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once(KV_SEP) else {
                return Err(Error::MalformedEncoding(format!(
                    "attribute {:?} has no key separator",
                    pair
                )));
            };
            attributes.insert(key.to_string(), value.to_string());
        }

        Ok(Self {
            id,
            attributes,
            deleted,
        })
    }
}
