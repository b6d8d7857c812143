use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-R `<pad>`.
const PAD_ID: u32 = 1;

/// Encode a batch, truncated to `max_len` and right-padded to the longest
/// sequence. Returns `(input_ids, attention_mask)`, both `[B,T]`.
pub fn tokenize_batch_on_device(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut all_ids = Vec::with_capacity(rows.len() * width);
    let mut all_mask = Vec::with_capacity(rows.len() * width);
    for (ids, mask) in rows {
        let pad = width - ids.len();
        all_ids.extend(ids.into_iter().chain(std::iter::repeat(PAD_ID).take(pad)));
        all_mask.extend(mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let input_ids = Tensor::from_iter(all_ids, device)?.reshape((texts.len(), width))?;
    let attention_mask = Tensor::from_iter(all_mask, device)?.reshape((texts.len(), width))?;
    Ok((input_ids, attention_mask))
}
