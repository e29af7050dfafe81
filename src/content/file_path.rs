//! Canonical asset identifiers

use super::file_type::FileType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A (content-relative path, type) pair identifying a source or cooked asset.
///
/// The relative path uses `/` separators and carries no extension; the
/// extension is implied by the type and by which tree (source or cooked)
/// the path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FilePath {
    relative: String,
    file_type: FileType,
}

impl FilePath {
    pub fn new(relative: impl AsRef<str>, file_type: FileType) -> Self {
        Self {
            relative: normalize(relative.as_ref()),
            file_type,
        }
    }

    /// Build from a relative filename whose extension determines the type
    pub fn from_relative_filename(filename: &str) -> Option<Self> {
        let normalized = normalize(filename);
        let (stem, ext) = split_extension(&normalized)?;
        let file_type = FileType::from_source_extension(ext)?;
        Some(Self::new(stem, file_type))
    }

    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Same relative path, different type
    pub fn with_type(&self, file_type: FileType) -> Self {
        Self {
            relative: self.relative.clone(),
            file_type,
        }
    }

    /// Final path component without extension
    pub fn base_name(&self) -> &str {
        self.relative
            .rsplit_once('/')
            .map_or(self.relative.as_str(), |(_, name)| name)
    }

    /// Parent directory of the relative path ("" at the root)
    pub fn parent(&self) -> &str {
        self.relative.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    pub fn relative_source_filename(&self) -> String {
        format!("{}{}", self.relative, self.file_type.source_extension())
    }

    pub fn relative_cooked_filename(&self) -> String {
        format!("{}{}", self.relative, self.file_type.cooked_extension())
    }

    /// Whether this path lives under the given relative directory.
    /// Comparison ignores ASCII case.
    pub fn is_under_directory(&self, directory: &str) -> bool {
        let directory = directory.trim_end_matches('/');
        if directory.is_empty() {
            return true;
        }
        let len = directory.len();
        self.relative.len() > len
            && self.relative.is_char_boundary(len)
            && self.relative[..len].eq_ignore_ascii_case(directory)
            && self.relative.as_bytes()[len] == b'/'
    }

    /// Serialized form used in metadata records: `Type:relative/path`
    pub fn to_key(&self) -> String {
        format!("{}:{}", self.file_type.name(), self.relative)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file_type.is_texture() {
            // Every level shares the .png source, show the level instead.
            write!(f, "{}", self.relative_cooked_filename())
        } else {
            write!(f, "{}", self.relative_source_filename())
        }
    }
}

impl FromStr for FilePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, relative) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed file path key '{s}'"))?;
        Ok(Self::new(relative, type_name.parse()?))
    }
}

impl From<FilePath> for String {
    fn from(path: FilePath) -> Self {
        path.to_key()
    }
}

impl TryFrom<String> for FilePath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn normalize(relative: &str) -> String {
    relative.replace('\\', "/").trim_matches('/').to_string()
}

fn split_extension(filename: &str) -> Option<(&str, &str)> {
    let name_start = filename.rfind('/').map_or(0, |i| i + 1);
    let dot = filename[name_start..].rfind('.')? + name_start;
    Some((&filename[..dot], &filename[dot..]))
}

fn is_separator(c: char) -> bool {
    matches!(c, '/' | '.' | '-' | ' ')
}

/// Check that a relative source filename is a legal content path.
///
/// Rules: no empty path components, `{` only as the first and `}` only as
/// the last character, `.`, `-` and space never first, last or next to
/// another separator, and only ASCII alphanumerics or `_` otherwise.
pub fn is_valid_content_path(relative: &str) -> bool {
    let relative = relative.replace('\\', "/");
    let chars: Vec<char> = relative.chars().collect();
    if chars.is_empty() {
        return false;
    }
    let last = chars.len() - 1;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' if i != 0 => return false,
            '}' if i != last => return false,
            '{' | '}' => {}
            '/' => {
                if i == 0 || i == last || chars[i - 1] == '/' {
                    return false;
                }
            }
            '.' | '-' | ' ' => {
                if i == 0 || i == last {
                    return false;
                }
                if is_separator(chars[i - 1]) || is_separator(chars[i + 1]) {
                    return false;
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {}
            _ => return false,
        }
    }
    true
}
