//! Metalink 4 (RFC 5854) rendering of a result manifest.

use crate::manifest::ResultManifest;
use std::fmt::Write;

const METALINK_NS: &str = "urn:ietf:params:xml:ns:metalink";

pub fn render(manifest: &ResultManifest) -> String {
    let mut xml = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="utf-8"?>"#);
    let _ = writeln!(xml, r#"<metalink xmlns="{}">"#, METALINK_NS);
    let _ = writeln!(xml, "  <generator>{}</generator>", escape(&manifest.generator));

    for entry in &manifest.entries {
        let _ = writeln!(xml, r#"  <file name="{}">"#, escape(&entry.name));
        let _ = writeln!(xml, "    <identity>{}</identity>", escape(&entry.name));
        let _ = writeln!(xml, "    <description>{}</description>", escape(&entry.mime_type));
        let _ = writeln!(xml, "    <size>{}</size>", entry.size);
        let _ = writeln!(
            xml,
            r#"    <metaurl mediatype="{}">{}</metaurl>"#,
            escape(&entry.mime_type),
            escape(&entry.location)
        );
        let _ = writeln!(xml, "    <url>{}</url>", escape(&entry.location));
        let _ = writeln!(xml, "  </file>");
    }

    xml.push_str("</metalink>\n");
    xml
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
