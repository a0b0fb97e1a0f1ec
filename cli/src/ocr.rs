//! OCR through an external command.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use pdfblocks::{OcrError, SharedOcrEngine};

/// Runs a command per image: a JPEG, JPEG 2000 or PNG file on stdin,
/// recognized text on stdout.
///
/// `tesseract stdin stdout` is the usual choice.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    program: String,
    args: Vec<String>,
}

impl CommandOcr {
    /// Parse a command line such as `"tesseract stdin stdout -l eng"`.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl SharedOcrEngine for CommandOcr {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("stdin unavailable".to_string()))?;
        let data = image.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&data));

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(OcrError::Io(e)),
            Err(_) => return Err(OcrError::Engine("stdin writer panicked".to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let ocr = CommandOcr::parse("tesseract stdin stdout -l eng").unwrap();
        assert_eq!(ocr.program, "tesseract");
        assert_eq!(ocr.args, vec!["stdin", "stdout", "-l", "eng"]);
        assert!(CommandOcr::parse("   ").is_none());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let ocr = CommandOcr::parse("pdfblocks-no-such-ocr-program").unwrap();
        assert!(ocr.recognize(b"image").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_cat_echoes_input() {
        let ocr = CommandOcr::parse("cat").unwrap();
        assert_eq!(ocr.recognize(b"  hello  \n").unwrap(), "hello");
    }
}
