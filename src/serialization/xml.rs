use chrono::SecondsFormat;
use std::fmt::Write;

use crate::attributes::AttributeSet;
use crate::core::{FieldType, Result, Value};

use super::SerializeOptions;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Element name for a model: `Shop::HasMetadataTester` becomes `has-metadata-tester`.
pub fn root_tag(model_name: &str) -> String {
    let short = model_name.rsplit("::").next().unwrap_or(model_name);
    let mut tag = String::with_capacity(short.len() + 4);
    let mut prev: Option<char> = None;

    for c in short.chars() {
        if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            tag.push('-');
        }
        tag.extend(c.to_lowercase());
        prev = Some(c);
    }

    dasherize(&tag)
}

fn dasherize(name: &str) -> String {
    name.replace('_', "-")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn declared_type_name(field_type: FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::Integer => Some("integer"),
        FieldType::Float => Some("float"),
        FieldType::Boolean => Some("boolean"),
        FieldType::Date => Some("date"),
        FieldType::Timestamp => Some("dateTime"),
        _ => None,
    }
}

fn scalar(value: &Value) -> (Option<&'static str>, String) {
    match value {
        Value::Integer(i) => (Some("integer"), i.to_string()),
        Value::Float(f) => (Some("float"), f.to_string()),
        Value::Boolean(b) => (Some("boolean"), b.to_string()),
        Value::Date(d) => (Some("date"), d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(t) => (Some("dateTime"), t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        other => (None, other.to_string()),
    }
}

fn write_element(
    out: &mut String,
    depth: usize,
    name: &str,
    value: &Value,
    declared: Option<FieldType>,
) {
    let indent = "  ".repeat(depth);
    let tag = dasherize(name);

    // Writing to a String cannot fail.
    let _ = match value {
        Value::Null => match declared.and_then(declared_type_name) {
            Some(type_name) => writeln!(out, "{}<{} type=\"{}\" nil=\"true\"/>", indent, tag, type_name),
            None => writeln!(out, "{}<{} nil=\"true\"/>", indent, tag),
        },
        Value::Mapping(entries) if entries.is_empty() => writeln!(out, "{}<{}/>", indent, tag),
        Value::Mapping(entries) => {
            let _ = writeln!(out, "{}<{}>", indent, tag);
            for (key, child) in entries {
                write_element(out, depth + 1, key, child, None);
            }
            writeln!(out, "{}</{}>", indent, tag)
        }
        Value::Sequence(items) if items.is_empty() => {
            writeln!(out, "{}<{} type=\"array\"/>", indent, tag)
        }
        Value::Sequence(items) => {
            let _ = writeln!(out, "{}<{} type=\"array\">", indent, tag);
            for item in items {
                write_element(out, depth + 1, "item", item, None);
            }
            writeln!(out, "{}</{}>", indent, tag)
        }
        other => match scalar(other) {
            (Some(type_name), text) => writeln!(
                out,
                "{}<{} type=\"{}\">{}</{}>",
                indent,
                tag,
                type_name,
                escape(&text),
                tag
            ),
            (None, text) => writeln!(out, "{}<{}>{}</{}>", indent, tag, escape(&text), tag),
        },
    };
}

/// Renders the record as an XML document rooted at `root`. Native attributes
/// come first in column order, then `methods` entries in the order given.
pub fn render_xml(record: &dyn AttributeSet, root: &str, options: &SerializeOptions) -> Result<String> {
    let mut out = String::from(XML_HEADER);
    let _ = writeln!(out, "<{}>", root);

    for name in record.attribute_names() {
        if options.includes_attribute(&name) {
            let value = record.read_attribute(&name)?;
            write_element(&mut out, 1, &name, &value, record.column_type(&name));
        }
    }

    for name in &options.methods {
        let value = record.read_attribute(name)?;
        write_element(&mut out, 1, name, &value, None);
    }

    let _ = writeln!(out, "</{}>", root);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_tag() {
        assert_eq!(root_tag("HasMetadataTester"), "has-metadata-tester");
        assert_eq!(root_tag("Fixtures::HasMetadataTester"), "has-metadata-tester");
        assert_eq!(root_tag("user_profile"), "user-profile");
    }

    #[test]
    fn test_elements() {
        let mut out = String::new();
        write_element(&mut out, 1, "can_be_nil", &Value::Null, None);
        write_element(&mut out, 1, "id", &Value::Null, Some(FieldType::Integer));
        write_element(&mut out, 1, "number", &Value::Integer(123), None);
        write_element(&mut out, 1, "login", &Value::Text("a<b".into()), None);
        assert_eq!(
            out,
            "  <can-be-nil nil=\"true\"/>\n  \
             <id type=\"integer\" nil=\"true\"/>\n  \
             <number type=\"integer\">123</number>\n  \
             <login>a&lt;b</login>\n"
        );
    }
}
