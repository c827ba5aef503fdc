//! Parsers for rpm-md repository metadata: `repomd.xml`, `primary.xml` and
//! `filelists.xml`.
//!
//! Primary and filelists documents are large, so they are streamed: each
//! `<package>` element is cut out of the byte stream and parsed on its own.

use super::package::{format_evr, DepFlag, Dependency, RpmPackage};
use super::RepoError;
use std::io::{BufRead, BufReader, Read};

const NS_COMMON: &str = "http://linux.duke.edu/metadata/common";
const NS_RPM: &str = "http://linux.duke.edu/metadata/rpm";
const NS_FILELISTS: &str = "http://linux.duke.edu/metadata/filelists";

/// Location of one metadata file referenced from `repomd.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub kind: String,
    pub href: String,
    pub checksum: Option<String>,
    /// Digest algorithm of `checksum`, e.g. `sha256`.
    pub checksum_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMd {
    pub revision: Option<String>,
    pub data: Vec<DataLocation>,
}

impl RepoMd {
    pub fn parse(xml: &str) -> Result<Self, RepoError> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| RepoError::Metadata(format!("repomd.xml: {}", e)))?;
        let root = doc.root_element();
        if root.tag_name().name() != "repomd" {
            return Err(RepoError::Metadata(format!(
                "repomd.xml: unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let revision = root
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == "revision")
            .and_then(|c| c.text())
            .map(|t| t.trim().to_string());

        let data = root
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == "data")
            .filter_map(|data| {
                let kind = data.attribute("type")?.to_string();
                let href = data
                    .children()
                    .find(|c| c.is_element() && c.tag_name().name() == "location")?
                    .attribute("href")?
                    .to_string();
                let checksum_node = data
                    .children()
                    .find(|c| c.is_element() && c.tag_name().name() == "checksum");
                Some(DataLocation {
                    kind,
                    href,
                    checksum: checksum_node
                        .and_then(|c| c.text())
                        .map(|t| t.trim().to_string()),
                    checksum_type: checksum_node
                        .and_then(|c| c.attribute("type"))
                        .map(str::to_string),
                })
            })
            .collect();

        Ok(Self { revision, data })
    }

    pub fn location(&self, kind: &str) -> Option<&DataLocation> {
        self.data.iter().find(|d| d.kind == kind)
    }
}

/// Wraps `reader` in a decompressor chosen by the file name.
pub fn open_compressed<'a, R: Read + 'a>(
    href: &str,
    reader: R,
) -> Result<Box<dyn BufRead + 'a>, RepoError> {
    if href.ends_with(".gz") {
        Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(
            reader,
        ))))
    } else if href.ends_with(".zst") {
        let decoder = zstd::stream::read::Decoder::new(reader).map_err(|source| RepoError::Io {
            path: href.to_string(),
            source,
        })?;
        Ok(Box::new(BufReader::new(decoder)))
    } else if href.ends_with(".xml") {
        Ok(Box::new(BufReader::new(reader)))
    } else {
        Err(RepoError::UnsupportedCompression(href.to_string()))
    }
}

/// Calls `f` with every `<package>` element of a primary or filelists
/// stream.
fn for_each_package<R, F>(mut reader: R, source: &str, mut f: F) -> Result<(), RepoError>
where
    R: BufRead,
    F: FnMut(roxmltree::Node) -> Result<(), RepoError>,
{
    let mut fragment: Vec<u8> = Vec::new();
    let mut piece: Vec<u8> = Vec::new();
    let mut inside = false;

    loop {
        piece.clear();
        let read = reader
            .read_until(b'>', &mut piece)
            .map_err(|e| RepoError::Io {
                path: source.to_string(),
                source: e,
            })?;
        if read == 0 {
            break;
        }

        if !inside {
            if let Some(start) = find_package_start(&piece) {
                inside = true;
                fragment.extend_from_slice(&piece[start..]);
            }
        } else {
            fragment.extend_from_slice(&piece);
        }

        if inside && fragment.ends_with(b"</package>") {
            parse_fragment(&fragment, source, &mut f)?;
            fragment.clear();
            inside = false;
        }
    }

    if inside {
        return Err(RepoError::Metadata(format!(
            "{}: truncated <package> element",
            source
        )));
    }
    Ok(())
}

fn find_package_start(piece: &[u8]) -> Option<usize> {
    const TAG: &[u8] = b"<package";
    piece.windows(TAG.len()).enumerate().find_map(|(i, w)| {
        let next = piece.get(i + TAG.len()).copied();
        let boundary = matches!(next, Some(b' ' | b'\t' | b'\r' | b'\n' | b'>'));
        (w == TAG && boundary).then_some(i)
    })
}

fn parse_fragment<F>(fragment: &[u8], source: &str, f: &mut F) -> Result<(), RepoError>
where
    F: FnMut(roxmltree::Node) -> Result<(), RepoError>,
{
    let text = std::str::from_utf8(fragment)
        .map_err(|e| RepoError::Metadata(format!("{}: invalid UTF-8: {}", source, e)))?;
    let wrapped = format!(
        "<metadata xmlns=\"{}\" xmlns:rpm=\"{}\" xmlns:fl=\"{}\">{}</metadata>",
        NS_COMMON, NS_RPM, NS_FILELISTS, text
    );
    let doc = roxmltree::Document::parse(&wrapped)
        .map_err(|e| RepoError::Metadata(format!("{}: {}", source, e)))?;
    let package = doc
        .root_element()
        .children()
        .find(|c| c.is_element())
        .ok_or_else(|| RepoError::Metadata(format!("{}: empty package", source)))?;
    f(package)
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: roxmltree::Node, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
}

fn dependencies(format: roxmltree::Node, kind: &str) -> Vec<Dependency> {
    let Some(list) = child(format, kind) else {
        return Vec::new();
    };
    list.children()
        .filter(|c| c.is_element() && c.tag_name().name() == "entry")
        .filter_map(|entry| {
            let name = entry.attribute("name")?.to_string();
            let flag = entry.attribute("flags").and_then(DepFlag::parse);
            let evr = format_evr(
                entry.attribute("epoch"),
                entry.attribute("ver"),
                entry.attribute("rel"),
            );
            Some(match (flag, evr) {
                (Some(flag), Some(evr)) => Dependency::versioned(name, flag, evr),
                _ => Dependency::unversioned(name),
            })
        })
        .collect()
}

fn parse_primary_package(node: roxmltree::Node, source: &str) -> Result<RpmPackage, RepoError> {
    let missing = |what: &str| RepoError::Metadata(format!("{}: package without {}", source, what));

    let name = child_text(node, "name").ok_or_else(|| missing("name"))?;
    let arch = child_text(node, "arch").ok_or_else(|| missing("arch"))?;
    let version = child(node, "version").ok_or_else(|| missing("version"))?;
    let pkgid = child_text(node, "checksum").unwrap_or_else(|| format!("{}.{}", name, arch));

    let mut package = RpmPackage {
        name,
        epoch: version
            .attribute("epoch")
            .and_then(|e| e.parse().ok())
            .unwrap_or(0),
        version: version.attribute("ver").unwrap_or_default().to_string(),
        release: version.attribute("rel").unwrap_or_default().to_string(),
        arch,
        sourcerpm: None,
        provides: Vec::new(),
        requires: Vec::new(),
        files: Vec::new(),
        pkgid,
    };

    if let Some(format) = child(node, "format") {
        package.sourcerpm = child_text(format, "sourcerpm").filter(|s| !s.is_empty());
        package.provides = dependencies(format, "provides");
        package.requires = dependencies(format, "requires");
        package.files = format
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == "file")
            .filter_map(|c| c.text())
            .map(|t| t.trim().to_string())
            .collect();
    }

    Ok(package)
}

/// Streams the packages of a primary document.
pub fn read_primary<R, F>(reader: R, source: &str, mut f: F) -> Result<(), RepoError>
where
    R: BufRead,
    F: FnMut(RpmPackage),
{
    for_each_package(reader, source, |node| {
        f(parse_primary_package(node, source)?);
        Ok(())
    })
}

/// Streams `(pkgid, files)` of a filelists document.
pub fn read_filelists<R, F>(reader: R, source: &str, mut f: F) -> Result<(), RepoError>
where
    R: BufRead,
    F: FnMut(&str, Vec<String>),
{
    for_each_package(reader, source, |node| {
        let pkgid = node
            .attribute("pkgid")
            .ok_or_else(|| RepoError::Metadata(format!("{}: filelist without pkgid", source)))?;
        let files = node
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == "file")
            .filter_map(|c| c.text())
            .map(|t| t.trim().to_string())
            .collect();
        f(pkgid, files);
        Ok(())
    })
}
