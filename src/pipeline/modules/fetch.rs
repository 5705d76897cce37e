//! Fetch module: reads records from a local JSON source.
//!
//! The source is a `file://` URL or a plain path holding either an array of
//! items or an object with an `items` array. Non-object items are wrapped as
//! `{"content": item}`. The source is read lazily, once per input record.

use crate::pipeline::conf::{Conf, FieldSpec};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::modules::{per_item, per_item_async};
use crate::pipeline::record::{self, Record};
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const URL: FieldSpec = FieldSpec::text("URL");

const FILE_SCHEME: &str = "file://";

pub struct FetchFactory;

/// Map a source URL to a local path.
fn source_path(url: &str) -> PipelineResult<PathBuf> {
    if let Some(path) = url.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(PipelineError::invalid_config(
            URL.name,
            format!("unsupported source '{url}', only local files can be fetched"),
        ));
    }
    Ok(PathBuf::from(url))
}

fn validate(conf: &Conf) -> PipelineResult<()> {
    let bound = conf
        .raw(URL.name)
        .and_then(|descriptor| descriptor.get("subkey"))
        .is_some();
    if bound {
        return Ok(());
    }
    source_path(&conf.required_text(&URL, None)?).map(|_| ())
}

/// Items of a parsed source document.
pub fn parse_items(document: Value) -> Vec<Record> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                object.insert("items".into(), other);
                vec![Value::Object(object)]
            }
            None => vec![Value::Object(object)],
        },
        scalar => vec![scalar],
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => record,
            other => record::single("content", other),
        })
        .collect()
}

fn load(conf: &Conf, item: &Record) -> PipelineResult<Vec<Record>> {
    let path = source_path(&conf.required_text(&URL, Some(item))?)?;
    tracing::debug!(path = %path.display(), "Fetching items");
    let content = std::fs::read_to_string(&path)?;
    Ok(parse_items(serde_json::from_str(&content)?))
}

async fn load_async(conf: &Conf, item: &Record) -> PipelineResult<Vec<Record>> {
    let path = source_path(&conf.required_text(&URL, Some(item))?)?;
    tracing::debug!(path = %path.display(), "Fetching items");
    let content = tokio::fs::read_to_string(&path).await?;
    Ok(parse_items(serde_json::from_str(&content)?))
}

#[async_trait]
impl StageFactory for FetchFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        validate(&args.conf)?;
        let conf = args.conf;
        Ok(StageOutput::Stage(per_item(args.input, move |item| {
            load(&conf, &item)
        })))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        validate(&args.conf)?;
        let conf = Arc::new(args.conf);
        Ok(StageOutput::Stage(per_item_async(args.input, move |item| {
            let conf = Arc::clone(&conf);
            async move { load_async(&conf, &item).await }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::modules::test_support::{args_with, forever_args};
    use crate::pipeline::stage::{single, StageKind};
    use futures_util::StreamExt;
    use serde_json::json;
    use std::io::Write;

    fn source(content: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_parse_items_shapes() {
        assert_eq!(parse_items(json!([{"a": 1}, 2])).len(), 2);
        assert_eq!(parse_items(json!({"items": [{"a": 1}]}))[0]["a"], json!(1));
        assert_eq!(parse_items(json!({"title": "x"}))[0]["title"], json!("x"));
        assert_eq!(parse_items(json!("s"))[0]["content"], json!("s"));
    }

    #[test]
    fn test_fetch_from_file_url() {
        let file = source(&json!([{"t": "a"}, {"t": "b"}]));
        let url = format!("file://{}", file.path().display());
        let stage = single(
            FetchFactory
                .build(forever_args(json!({"URL": {"value": url}})))
                .unwrap(),
        )
        .unwrap();
        let titles: Vec<_> = stage.map(|r| r.unwrap()["t"].clone()).collect();
        assert_eq!(titles, [json!("a"), json!("b")]);
    }

    #[test]
    fn test_missing_url_is_invalid_config() {
        let result = FetchFactory.build(forever_args(json!({})));
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_remote_url_rejected() {
        let result = FetchFactory.build(forever_args(json!({"URL": "http://example.com/feed"})));
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_missing_file_fails_on_pull() {
        let mut stage = single(
            FetchFactory
                .build(forever_args(json!({"URL": "/definitely/not/here.json"})))
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(stage.next(), Some(Err(PipelineError::Io(_)))));
    }

    #[tokio::test]
    async fn test_fetch_async() {
        let file = source(&json!({"items": [{"n": 1}, {"n": 2}, {"n": 3}]}));
        let conf = json!({"URL": {"value": file.path().display().to_string()}});
        let stage = single(
            FetchFactory
                .build_async(args_with(AsyncStage::forever(), conf))
                .await
                .unwrap(),
        )
        .unwrap();
        let out: Vec<_> = stage.collect().await;
        assert_eq!(out.len(), 3);
    }
}
