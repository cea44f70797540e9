//! ComponentId - 组件标识 (Arc<str>，clone 只增引用计数)

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Identifier of a mirrored component.
///
/// Remote systems address components either by number (node id, IMSI) or by
/// name; both collapse into the same text key. Ids are copied into every
/// history entry, prediction and anomaly record, so clones share one
/// allocation.
///
/// `Hash`/`Eq`/`Ord` delegate to the text, which keeps `&str` lookups valid on
/// `HashMap<ComponentId, _>`.
///
/// ```
/// use contracts::ComponentId;
///
/// let numeric: ComponentId = 7u64.into();
/// let named: ComponentId = "7".into();
/// assert_eq!(numeric, named);
/// assert_eq!(numeric.as_str(), "7");
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(s: &str) -> Self {
        Self(s.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ComponentId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&String> for ComponentId {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

macro_rules! numeric_ids {
    ($($int:ty),*) => {
        $(impl From<$int> for ComponentId {
            fn from(n: $int) -> Self {
                Self(n.to_string().into())
            }
        })*
    };
}

numeric_ids!(u32, u64);

impl PartialEq<str> for ComponentId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ComponentId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentId").field(&self.as_str()).finish()
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Accepts `"7"` and `7` alike
struct ComponentIdVisitor;

impl<'de> Visitor<'de> for ComponentIdVisitor {
    type Value = ComponentId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a component id (string or integer)")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ComponentId, E> {
        Ok(ComponentId::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ComponentId, E> {
        Ok(ComponentId::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ComponentId, E> {
        Ok(ComponentId::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ComponentId, E> {
        Ok(ComponentId(v.to_string().into()))
    }
}

impl<'de> Deserialize<'de> for ComponentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // bincode 不支持 deserialize_any；二进制格式里 id 总是按字符串写出
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ComponentIdVisitor)
        } else {
            deserializer.deserialize_str(ComponentIdVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clones_share_allocation() {
        let a: ComponentId = "gnb-1".into();
        let b = a.clone();
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
    }

    #[test]
    fn test_numeric_and_text_ids_agree() {
        let id: ComponentId = 42u32.into();
        assert_eq!(id, "42");
        assert_eq!(id, ComponentId::from(42u64));
        assert_eq!(format!("{id:?}"), "ComponentId(\"42\")");
    }

    #[test]
    fn test_str_lookup_in_map() {
        let map: HashMap<ComponentId, i32> =
            HashMap::from([("ue-1".into(), 1), (2u64.into(), 2)]);
        assert_eq!(map.get("ue-1"), Some(&1));
        assert_eq!(map.get("2"), Some(&2));
    }

    #[test]
    fn test_sorted_by_text() {
        let mut ids: Vec<ComponentId> = vec!["b".into(), "a".into(), "c".into()];
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id: ComponentId = "ue-9".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ue-9\"");
        assert_eq!(serde_json::from_str::<ComponentId>(&json).unwrap(), id);
    }

    #[test]
    fn test_integer_ids_deserialize() {
        assert_eq!(serde_json::from_str::<ComponentId>("7").unwrap(), "7");
        assert_eq!(serde_json::from_str::<ComponentId>("-3").unwrap(), "-3");
        assert!(serde_json::from_str::<ComponentId>("1.5").is_err());
        assert!(serde_json::from_str::<ComponentId>("true").is_err());
    }

    #[test]
    fn test_bincode_keeps_string_encoding() {
        let id: ComponentId = 42u64.into();
        let bytes = bincode::serialize(&id).unwrap();
        assert_eq!(bincode::deserialize::<ComponentId>(&bytes).unwrap(), id);
    }
}
