//! Wei amounts in the config file may exceed the JSON safe integer range, so they are
//! accepted both as numbers and as decimal strings.
use std::fmt;

use serde::{de, Deserializer};

struct WeiVisitor;

impl de::Visitor<'_> for WeiVisitor {
    type Value = u128;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a wei amount as an unsigned integer or a decimal string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.trim().parse::<u128>().map_err(de::Error::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(u128::from(value))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Self::Value, E> {
        Ok(value)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u128::try_from(value).map_err(|_| de::Error::custom("wei amount cannot be negative"))
    }
}

pub fn deserialize_wei<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(WeiVisitor)
}
