//! Exchange rate module, priced from a bundled USD rate table.

use crate::pipeline::conf::{Conf, FieldSpec};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::record::Record;
use crate::pipeline::stage::RecordTransform;
use serde_json::Value;

const QUOTE: FieldSpec = FieldSpec::text("quote").or("USD");
const DEFAULT: FieldSpec = FieldSpec::text("default").or("USD");
const ASSIGN: FieldSpec = FieldSpec::text("assign").or("rate");

const BASE_KEY: &str = "content";

/// Units of each currency per US dollar.
pub const USD_RATES: [(&str, f64); 6] = [
    ("USD", 1.0),
    ("EUR", 0.8234),
    ("GBP", 0.6448),
    ("INR", 63.6810),
    ("PLN", 3.76),
    ("SGD", 1.34),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeRate;

fn usd_rate(currency: &str) -> PipelineResult<f64> {
    USD_RATES
        .iter()
        .find(|(name, _)| *name == currency)
        .map(|&(_, rate)| rate)
        .ok_or_else(|| PipelineError::Module(format!("no exchange rate for USD/{currency}")))
}

/// Price of one unit of `from` in `to`.
pub fn calc_rate(from: &str, to: &str) -> PipelineResult<f64> {
    let rate = if from == to {
        1.0
    } else if to == "USD" {
        usd_rate(from)?
    } else {
        usd_rate(from)? * (1.0 / usd_rate(to)?)
    };
    Ok(1.0 / rate)
}

impl RecordTransform for ExchangeRate {
    fn transform(&self, conf: &Conf, mut record: Record) -> PipelineResult<Record> {
        let base = match record.get(BASE_KEY) {
            Some(Value::String(base)) if !base.is_empty() => base.to_uppercase(),
            _ => conf.text(&DEFAULT, Some(&record))?.to_uppercase(),
        };
        let quote = conf.text(&QUOTE, Some(&record))?.to_uppercase();
        let rate = calc_rate(&base, &quote)?;
        tracing::trace!(%base, %quote, rate, "Priced currency pair");
        record.insert(conf.text(&ASSIGN, None)?, Value::from(rate));
        Ok(record)
    }
}
