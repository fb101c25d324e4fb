//! First encoding stage: a serde `Serializer` that builds a `Node` tree.
//!
//! The tree keeps everything a self-describing serializer would see: the
//! type name of every struct, newtype and enum (`Node::Tagged`), and the
//! difference between a field that is not set (`Node::Absent`) and one that
//! is explicitly null (`Node::Null`). The normalization pass decides what
//! reaches the wire.

use serde::ser::{self, Serialize};
use serde_json::Number;

use super::CodecError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// `None` at the top of a value: the field was never set.
    Absent,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<Node>),
    /// Entries of a map, including structs with a flattened field.
    Map(Vec<(String, Node)>),
    /// Fields of a struct. Absent fields are dropped.
    Struct(Vec<(&'static str, Node)>),
    Tagged(&'static str, Box<Node>),
}

fn tagged(tag: &'static str, variant: Option<&'static str>, node: Node) -> Node {
    let node = match variant {
        Some(variant) => Node::Map(vec![(variant.to_string(), node)]),
        None => node,
    };
    Node::Tagged(tag, Box::new(node))
}

fn map_key(node: Node) -> Result<String, CodecError> {
    match node {
        Node::String(key) => Ok(key),
        Node::Number(n) => Ok(n.to_string()),
        Node::Bool(b) => Ok(b.to_string()),
        Node::Tagged(_, inner) => map_key(*inner),
        other => Err(CodecError::Encode(format!(
            "map key must be a string, got {other:?}"
        ))),
    }
}

pub(crate) struct TreeSerializer;

impl ser::Serializer for TreeSerializer {
    type Ok = Node;
    type Error = CodecError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = StructBuilder;
    type SerializeStructVariant = StructBuilder;

    fn serialize_bool(self, v: bool) -> Result<Node, CodecError> {
        Ok(Node::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, CodecError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, CodecError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, CodecError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, CodecError> {
        Ok(Node::Number(v.into()))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, CodecError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, CodecError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, CodecError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, CodecError> {
        Ok(Node::Number(v.into()))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, CodecError> {
        self.serialize_f64(f64::from(v))
    }

    // Non-finite floats have no JSON form.
    fn serialize_f64(self, v: f64) -> Result<Node, CodecError> {
        Ok(Number::from_f64(v).map_or(Node::Null, Node::Number))
    }

    fn serialize_char(self, v: char) -> Result<Node, CodecError> {
        Ok(Node::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Node, CodecError> {
        Ok(Node::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, CodecError> {
        Ok(Node::Seq(
            v.iter().map(|b| Node::Number((*b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<Node, CodecError> {
        Ok(Node::Absent)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Node, CodecError>
    where
        T: ?Sized + Serialize,
    {
        // `Some(None)` is a value that was set to null.
        match value.serialize(TreeSerializer)? {
            Node::Absent => Ok(Node::Null),
            node => Ok(node),
        }
    }

    fn serialize_unit(self) -> Result<Node, CodecError> {
        Ok(Node::Null)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Node, CodecError> {
        Ok(tagged(name, None, Node::Null))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Node, CodecError> {
        Ok(tagged(name, None, Node::String(variant.to_owned())))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Node, CodecError>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(name, None, value.serialize(TreeSerializer)?))
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, CodecError>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(name, Some(variant), value.serialize(TreeSerializer)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, CodecError> {
        Ok(SeqBuilder::new(None, None, len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, CodecError> {
        Ok(SeqBuilder::new(None, None, Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, CodecError> {
        Ok(SeqBuilder::new(Some(name), None, Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, CodecError> {
        Ok(SeqBuilder::new(Some(name), Some(variant), Some(len)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, CodecError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<StructBuilder, CodecError> {
        Ok(StructBuilder {
            tag: name,
            variant: None,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructBuilder, CodecError> {
        Ok(StructBuilder {
            tag: name,
            variant: Some(variant),
            fields: Vec::with_capacity(len),
        })
    }
}

pub(crate) struct SeqBuilder {
    tag: Option<&'static str>,
    variant: Option<&'static str>,
    items: Vec<Node>,
}

impl SeqBuilder {
    fn new(tag: Option<&'static str>, variant: Option<&'static str>, len: Option<usize>) -> Self {
        Self {
            tag,
            variant,
            items: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(TreeSerializer)?);
        Ok(())
    }

    fn finish(self) -> Node {
        let seq = Node::Seq(self.items);
        match self.tag {
            Some(tag) => tagged(tag, self.variant, seq),
            None => seq,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

pub(crate) struct MapBuilder {
    entries: Vec<(String, Node)>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(map_key(key.serialize(TreeSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| CodecError::Encode("map value serialized before its key".into()))?;
        self.entries.push((key, value.serialize(TreeSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(Node::Map(self.entries))
    }
}

pub(crate) struct StructBuilder {
    tag: &'static str,
    variant: Option<&'static str>,
    fields: Vec<(&'static str, Node)>,
}

impl StructBuilder {
    fn push<T>(&mut self, key: &'static str, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.fields.push((key, value.serialize(TreeSerializer)?));
        Ok(())
    }

    fn finish(self) -> Node {
        tagged(self.tag, self.variant, Node::Struct(self.fields))
    }
}

impl ser::SerializeStruct for StructBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for StructBuilder {
    type Ok = Node;
    type Error = CodecError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), CodecError>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn end(self) -> Result<Node, CodecError> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Widget {
        id: u32,
        label: Option<String>,
    }

    #[derive(Serialize)]
    struct Wrapper(Widget);

    #[test]
    fn structs_keep_their_type_name() {
        let node = Widget { id: 7, label: None }.serialize(TreeSerializer).unwrap();
        assert_eq!(
            node,
            Node::Tagged(
                "Widget",
                Box::new(Node::Struct(vec![
                    ("id", Node::Number(7.into())),
                    ("label", Node::Absent),
                ]))
            )
        );
    }

    #[test]
    fn newtypes_nest_tags() {
        let node = Wrapper(Widget { id: 1, label: None })
            .serialize(TreeSerializer)
            .unwrap();
        match node {
            Node::Tagged("Wrapper", inner) => {
                assert!(matches!(*inner, Node::Tagged("Widget", _)));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn some_none_is_an_explicit_null() {
        let value: Option<Option<String>> = Some(None);
        assert_eq!(value.serialize(TreeSerializer).unwrap(), Node::Null);
        let unset: Option<Option<String>> = None;
        assert_eq!(unset.serialize(TreeSerializer).unwrap(), Node::Absent);
    }

    #[test]
    fn integer_map_keys_become_strings() {
        let mut map = BTreeMap::new();
        map.insert(3, "three");
        let node = map.serialize(TreeSerializer).unwrap();
        assert_eq!(
            node,
            Node::Map(vec![("3".to_string(), Node::String("three".to_string()))])
        );
    }

    #[test]
    fn sequence_keys_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1], "one");
        assert!(map.serialize(TreeSerializer).is_err());
    }
}
