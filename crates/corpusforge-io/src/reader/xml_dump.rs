//! XML dump reader: a bz2-compressed MediaWiki XML dump, read in pull mode
//! and reduced to the same accept/reject decision the original SAX handler
//! made: only namespace-0 pages whose text does not begin with a redirect
//! marker are forwarded.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use async_trait::async_trait;
use bzip2::read::BzDecoder;
use corpusforge_core::error::Error;
use corpusforge_core::queue::{send_sentinels, QueueItem, QueueTx};
use corpusforge_core::stage::Reader;
use corpusforge_core::types::RawRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader as XmlReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct XmlDumpReader {
    path: PathBuf,
}

impl XmlDumpReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Tracks the tag stack and in-progress `<page>` fields, mirroring the
/// original `XMLReader(ContentHandler)`'s `startElement`/`characters`/
/// `endElement` callbacks.
#[derive(Default)]
struct PageState {
    stack: Vec<String>,
    title: Option<String>,
    text: Option<String>,
    namespace: Option<i64>,
}

impl PageState {
    fn start(&mut self, name: &str) {
        match name {
            "ns" => self.namespace = None,
            "page" => {
                self.text = None;
                self.title = None;
            }
            "title" => self.title = Some(String::new()),
            "text" => self.text = Some(String::new()),
            "mediawiki" => {}
            _ => return,
        }
        self.stack.push(name.to_string());
    }

    fn characters(&mut self, content: &str) {
        match self.stack.last().map(String::as_str) {
            Some("text") => {
                if let Some(t) = &mut self.text {
                    t.push_str(content);
                }
            }
            Some("title") => {
                if let Some(t) = &mut self.title {
                    t.push_str(content);
                }
            }
            Some("ns") => {
                if let Ok(ns) = content.trim().parse::<i64>() {
                    self.namespace = Some(ns);
                }
            }
            _ => {}
        }
    }

    /// Returns `Some((title, text))` if the just-closed `page` is an
    /// accepted article, `None` otherwise. Pass the tag name that closed.
    fn end(&mut self, name: &str) -> Option<(String, String)> {
        if self.stack.is_empty() {
            return None;
        }
        if name == self.stack.last().map(String::as_str).unwrap_or_default() {
            self.stack.pop();
        }
        if name != "page" {
            return None;
        }
        let text = self.text.as_ref()?;
        if self.namespace != Some(0) {
            return None;
        }
        let first_line = text.split('\n').next().unwrap_or_default();
        if first_line.to_uppercase().contains("REDIRECT") {
            return None;
        }
        Some((self.title.clone().unwrap_or_default(), text.clone()))
    }
}

#[async_trait]
impl Reader<RawRecord> for XmlDumpReader {
    async fn run(
        &mut self,
        tx: QueueTx<RawRecord>,
        n_workers: usize,
        cancel: CancellationToken,
    ) -> Result<u64, Error> {
        let path = self.path.clone();
        let tx2 = tx.clone();
        let cancel2 = cancel.clone();
        let records_read = tokio::task::spawn_blocking(move || -> Result<u64, Error> {
            let file = File::open(&path).map_err(|e| Error::Other(e.into()))?;
            let decoder = BzDecoder::new(file);
            let mut xml = XmlReader::from_reader(BufReader::new(decoder));
            xml.config_mut().trim_text(false);

            let mut state = PageState::default();
            let mut buf = Vec::new();
            let mut records_read = 0u64;

            loop {
                if cancel2.is_cancelled() {
                    break;
                }
                match xml.read_event_into(&mut buf) {
                    Ok(Event::Start(e)) => {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        state.start(&name);
                    }
                    Ok(Event::Text(e)) => {
                        let content = e.unescape().unwrap_or_default();
                        state.characters(&content);
                    }
                    Ok(Event::End(e)) => {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        if let Some((title, text)) = state.end(&name) {
                            if tx2
                                .blocking_send(QueueItem::Payload(RawRecord::XmlPage {
                                    title,
                                    text,
                                }))
                                .is_err()
                            {
                                break;
                            }
                            records_read += 1;
                        }
                        if name == "mediawiki" {
                            break;
                        }
                    }
                    Ok(Event::Eof) => break,
                    Err(e) => return Err(Error::Other(e.into())),
                    _ => {}
                }
                buf.clear();
            }
            Ok(records_read)
        })
        .await
        .map_err(|e| Error::Other(e.into()))??;

        info!(records_read, "xml dump reader finished");
        send_sentinels(&tx, n_workers).await;
        Ok(records_read)
    }
}
