//! Archive decompression and markup parsing.
//!
//! # Responsibility
//! - Detect gzip by magic bytes and inflate; accept plain markup otherwise.
//! - Build the `RawNode` tree with an explicit element stack.
//!
//! # Invariants
//! - Exactly one root element; unclosed or stray elements are malformed input.

use super::{ArchiveError, ArchiveResult, RawNode};
use flate2::read::GzDecoder;
use log::{error, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads an archive file and returns the root of its tree.
///
/// # Side effects
/// - Emits `archive_read` logging events with size, duration and status.
pub fn read_archive(path: impl AsRef<Path>) -> ArchiveResult<RawNode> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=archive_read module=archive status=start path={}",
        path.display()
    );

    let bytes = std::fs::read(path).map_err(|source| {
        error!(
            "event=archive_read module=archive status=error error_code=read_failed error={}",
            source
        );
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;

    match parse_archive_bytes(&bytes) {
        Ok(root) => {
            info!(
                "event=archive_read module=archive status=ok bytes={} duration_ms={}",
                bytes.len(),
                started_at.elapsed().as_millis()
            );
            Ok(root)
        }
        Err(err) => {
            error!(
                "event=archive_read module=archive status=error error_code=malformed duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Parses archive bytes, inflating them first when gzip-compressed.
pub fn parse_archive_bytes(bytes: &[u8]) -> ArchiveResult<RawNode> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut markup = String::new();
        GzDecoder::new(bytes)
            .read_to_string(&mut markup)
            .map_err(|err| ArchiveError::MalformedArchive(format!("decompression failed: {err}")))?;
        return parse_tree(&markup);
    }

    let markup = std::str::from_utf8(bytes)
        .map_err(|err| ArchiveError::MalformedArchive(format!("archive is not UTF-8: {err}")))?;
    parse_tree(markup)
}

/// Parses markup text into a labeled tree.
pub fn parse_tree(markup: &str) -> ArchiveResult<RawNode> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut stack: Vec<RawNode> = Vec::new();
    let mut root: Option<RawNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(node_from_start(&start)?),
            Event::Empty(start) => {
                let node = node_from_start(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| {
                    ArchiveError::MalformedArchive("unexpected closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|err| {
                    ArchiveError::MalformedArchive(format!("CDATA is not UTF-8: {err}"))
                })?;
                append_text(&mut stack, text);
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ArchiveError::MalformedArchive(format!(
            "element `{}` is never closed",
            open.tag
        )));
    }
    root.ok_or_else(|| ArchiveError::MalformedArchive("archive has no root element".to_string()))
}

fn node_from_start(start: &BytesStart<'_>) -> ArchiveResult<RawNode> {
    let tag = utf8(start.name().as_ref(), "tag name")?;
    let mut node = RawNode::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = utf8(attribute.key.as_ref(), "attribute name")?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attribute.unescape_value()?;
        node.attributes.push((key, value.into_owned()));
    }
    Ok(node)
}

fn attach(stack: &mut [RawNode], root: &mut Option<RawNode>, node: RawNode) -> ArchiveResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(ArchiveError::MalformedArchive(format!(
            "second root element `{}`",
            node.tag
        )));
    }
    *root = Some(node);
    Ok(())
}

fn append_text(stack: &mut [RawNode], text: &str) {
    let Some(node) = stack.last_mut() else {
        return;
    };
    match node.text.as_mut() {
        Some(existing) => existing.push_str(text),
        None => node.text = Some(text.to_string()),
    }
}

fn utf8(bytes: &[u8], what: &str) -> ArchiveResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| ArchiveError::MalformedArchive(format!("{what} is not UTF-8: {err}")))
}
