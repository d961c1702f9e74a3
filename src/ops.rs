use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{self, select, WorkdirLocation};
use crate::convert::dictionary::Dictionary;
use crate::convert::{Direction, ScriptConverter};
use crate::error::{ConvertError, Result};
use crate::extract;

/// Everything one conversion run needs
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub dictionary: Option<PathBuf>,
    pub emit_text: bool,
    pub direction: Direction,
    pub workdir: WorkdirLocation,
    /// Leave the working tree on disk after the run
    pub keep_workdir: bool,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, direction: Direction) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            dictionary: None,
            emit_text: false,
            direction,
            workdir: WorkdirLocation::Temporary,
            keep_workdir: false,
        }
    }

    /// Plain-text side file: the output path with a `.txt` extension
    pub fn text_output(&self) -> PathBuf {
        self.output.with_extension("txt")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub text_output: Option<PathBuf>,
    pub files_converted: usize,
    pub entries_packed: usize,
    pub kept_workdir: Option<PathBuf>,
}

/// Sequences unpack, per-file conversion, repack and text output.
pub struct Pipeline {
    converter: Box<dyn ScriptConverter>,
}

impl Pipeline {
    pub fn new(converter: Box<dyn ScriptConverter>) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &dyn ScriptConverter {
        self.converter.as_ref()
    }

    /// Script conversion followed by dictionary overrides
    pub fn transform(&self, text: &str, direction: Direction, dictionary: &Dictionary) -> Result<String> {
        let converted = self.converter.convert(text, direction)?;
        Ok(dictionary.apply(&converted))
    }

    pub fn run(&self, request: &ConversionRequest) -> Result<ConversionReport> {
        tracing::info!(
            "Converting {:?} -> {:?} ({} via {})",
            request.input,
            request.output,
            request.direction,
            self.converter.backend_name()
        );
        self.converter.check(request.direction)?;

        // Loaded before unpacking so a bad dictionary never touches any file
        let dictionary = match &request.dictionary {
            Some(path) => Dictionary::load(path)?,
            None => Dictionary::default(),
        };

        let mut tree = archive::unpack(&request.input, &request.workdir)?;
        tree.set_keep(request.keep_workdir);

        let mut all_text = String::new();
        let mut files_converted = 0;
        for path in select::convertible_files(tree.path()) {
            let path = path?;
            tracing::debug!("Converting {:?}", path.strip_prefix(tree.path()).unwrap_or(&path));

            let content = fs::read_to_string(&path).map_err(|e| ConvertError::io(&path, e))?;
            let converted = self.transform(&content, request.direction, &dictionary)?;
            fs::write(&path, &converted).map_err(|e| ConvertError::io(&path, e))?;
            files_converted += 1;

            if request.emit_text {
                all_text.push_str(&extract::markup_to_text(&converted));
                all_text.push_str("\n\n");
            }
        }
        tracing::info!("Converted {} files", files_converted);

        // the staging file is private; give the output the input's mode
        let permissions = fs::metadata(&request.input).ok().map(|m| m.permissions());
        let entries_packed = archive::repack(tree.path(), &request.output, permissions)?;

        let text_output = if request.emit_text {
            let txt = request.text_output();
            write_text(&txt, &all_text)?;
            Some(txt)
        } else {
            None
        };

        let kept_workdir = request.keep_workdir.then(|| tree.keep());

        tracing::info!("Conversion complete.");
        Ok(ConversionReport {
            output: request.output.clone(),
            text_output,
            files_converted,
            entries_packed,
            kept_workdir,
        })
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    tracing::info!("Writing plain text ({} bytes) to {:?}", text.len(), path);
    fs::write(path, text).map_err(|e| ConvertError::io(path, e))
}

/// Default output: `<stem><suffix>.epub` beside the input, with the file name
/// itself run through the converter.
pub fn default_output_path(
    input: &Path,
    direction: Direction,
    converter: &dyn ScriptConverter,
) -> Result<PathBuf> {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!("{}{}.epub", stem, direction.output_suffix());
    let name = converter.convert(&name, direction)?;
    Ok(input.with_file_name(name))
}

/// `dictionary.txt` beside the input, when present
pub fn default_dictionary_path(input: &Path) -> Option<PathBuf> {
    let candidate = input.with_file_name("dictionary.txt");
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{IdentityConverter, ZhConverter};

    #[test]
    fn transform_converts_before_overriding() {
        let pipeline = Pipeline::new(Box::new(ZhConverter::new()));
        // the dictionary sees Traditional text, so it must match 軟件 not 软件
        let dict = Dictionary::parse("軟件,軟體\n", Path::new("d.txt")).unwrap();
        let out = pipeline.transform("软件", Direction::S2t, &dict).unwrap();
        assert_eq!(out, "軟體");
    }

    #[test]
    fn transform_is_deterministic() {
        let pipeline = Pipeline::new(Box::new(ZhConverter::new()));
        let dict = Dictionary::parse("旧,新\n新,最新\n", Path::new("d.txt")).unwrap();
        let a = pipeline.transform("旧新 简体", Direction::Identity, &dict).unwrap();
        let b = pipeline.transform("旧新 简体", Direction::Identity, &dict).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "新最新 简体");
    }

    #[test]
    fn default_output_inserts_suffix() {
        let out = default_output_path(Path::new("/books/小说.epub"), Direction::S2t, &ZhConverter::new()).unwrap();
        assert_eq!(out, PathBuf::from("/books/小說_繁體.epub"));

        let out = default_output_path(Path::new("book.epub"), Direction::Identity, &IdentityConverter).unwrap();
        assert_eq!(out, PathBuf::from("book_copy.epub"));
    }

    #[test]
    fn text_output_sits_beside_archive() {
        let req = ConversionRequest::new("in.epub", "/out/book_繁體.epub", Direction::S2t);
        assert_eq!(req.text_output(), PathBuf::from("/out/book_繁體.txt"));
    }

    #[test]
    fn default_dictionary_only_when_present() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("book.epub");
        assert_eq!(default_dictionary_path(&input), None);
        fs::write(dir.path().join("dictionary.txt"), "a,b\n").unwrap();
        assert_eq!(default_dictionary_path(&input), Some(dir.path().join("dictionary.txt")));
    }
}
