//! The subset of XML-RPC spoken by the Koji hub.

use super::KojiError;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Double(f64),
    DateTime(String),
    Base64(String),
    Nil,
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Value::Int(i) => {
                let _ = write!(out, "<int>{}</int>", i);
            }
            Value::Bool(b) => {
                let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
            }
            Value::String(s) => {
                out.push_str("<string>");
                escape_into(out, s);
                out.push_str("</string>");
            }
            Value::Double(d) => {
                let _ = write!(out, "<double>{}</double>", d);
            }
            Value::DateTime(s) => {
                out.push_str("<dateTime.iso8601>");
                escape_into(out, s);
                out.push_str("</dateTime.iso8601>");
            }
            Value::Base64(s) => {
                out.push_str("<base64>");
                escape_into(out, s);
                out.push_str("</base64>");
            }
            Value::Nil => out.push_str("<nil/>"),
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write_xml(out);
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    out.push_str("<member><name>");
                    escape_into(out, name);
                    out.push_str("</name>");
                    value.write_xml(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
        }
        out.push_str("</value>");
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Koji passes keyword arguments as a trailing struct flagged with
/// `__starstar`.
pub fn kwargs<I, K>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut members: BTreeMap<String, Value> =
        pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
    members.insert("__starstar".to_string(), Value::Bool(true));
    Value::Struct(members)
}

pub fn method_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version='1.0'?>\n<methodCall>\n<methodName>");
    escape_into(&mut out, method);
    out.push_str("</methodName>\n<params>\n");
    for param in params {
        out.push_str("<param>\n");
        param.write_xml(&mut out);
        out.push_str("\n</param>\n");
    }
    out.push_str("</params>\n</methodCall>\n");
    out
}

/// Builds a `system.multicall` request out of `(method, params)` pairs.
pub fn multicall(calls: &[(&str, Vec<Value>)]) -> String {
    let entries = calls
        .iter()
        .map(|(method, params)| {
            let mut members = BTreeMap::new();
            members.insert("methodName".to_string(), Value::from(*method));
            members.insert("params".to_string(), Value::Array(params.clone()));
            Value::Struct(members)
        })
        .collect();
    method_call("system.multicall", &[Value::Array(entries)])
}

/// Decodes a `methodResponse` into its single return value.
pub fn parse_response(body: &str) -> Result<Value, KojiError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| KojiError::InvalidResponse(format!("malformed XML: {}", e)))?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(KojiError::InvalidResponse(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    if let Some(fault) = child(root, "fault") {
        let value = child(fault, "value")
            .ok_or_else(|| KojiError::InvalidResponse("fault without value".to_string()))
            .and_then(parse_value)?;
        return Err(fault_error(&value));
    }

    let value = child(root, "params")
        .and_then(|p| child(p, "param"))
        .and_then(|p| child(p, "value"))
        .ok_or_else(|| KojiError::InvalidResponse("response without value".to_string()))?;
    parse_value(value)
}

pub(crate) fn fault_error(value: &Value) -> KojiError {
    KojiError::Fault {
        code: value.get("faultCode").and_then(Value::as_i64).unwrap_or(0),
        message: value
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault")
            .to_string(),
    }
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn parse_value(node: roxmltree::Node) -> Result<Value, KojiError> {
    let Some(typed) = node.children().find(|c| c.is_element()) else {
        return Ok(Value::String(node.text().unwrap_or_default().to_string()));
    };

    let text = || typed.text().unwrap_or_default().trim().to_string();
    let invalid = |what: &str| KojiError::InvalidResponse(format!("invalid {}: {:?}", what, text()));

    match typed.tag_name().name() {
        "int" | "i4" | "i8" => text().parse().map(Value::Int).map_err(|_| invalid("integer")),
        "boolean" => match text().as_str() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            _ => Err(invalid("boolean")),
        },
        "string" => Ok(Value::String(
            typed.text().unwrap_or_default().to_string(),
        )),
        "double" => text().parse().map(Value::Double).map_err(|_| invalid("double")),
        "dateTime.iso8601" => Ok(Value::DateTime(text())),
        "base64" => Ok(Value::Base64(text())),
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = child(typed, "data")
                .ok_or_else(|| KojiError::InvalidResponse("array without data".to_string()))?;
            data.children()
                .filter(|c| c.is_element() && c.tag_name().name() == "value")
                .map(parse_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "member")
            {
                let name = child(member, "name")
                    .and_then(|n| n.text())
                    .unwrap_or_default()
                    .to_string();
                let value = child(member, "value")
                    .ok_or_else(|| KojiError::InvalidResponse("member without value".to_string()))
                    .and_then(parse_value)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(KojiError::InvalidResponse(format!(
            "unsupported XML-RPC type <{}>",
            other
        ))),
    }
}
