use std::io::Write;
use std::path::Path;

use actix_multipart::Field;
use actix_web::web;
use futures_util::stream::StreamExt;

use crate::error::ToolkitError;

/// The client supplied file name of a part, or `None` for plain form fields.
pub fn get_filename_from_field(field: &Field) -> Option<String> {
    field
        .content_disposition()
        .get_filename()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Consume a part without keeping its data. Its bytes still count against `budget`.
pub async fn drain_field(mut field: Field, budget: &mut u64) -> Result<(), ToolkitError> {
    while let Some(chunk) = field.next().await {
        charge(budget, chunk?.len() as u64)?;
    }
    Ok(())
}

fn charge(budget: &mut u64, len: u64) -> Result<(), ToolkitError> {
    *budget = budget.checked_sub(len).ok_or(ToolkitError::UploadTooLarge)?;
    Ok(())
}

/// Stream a part into `temp_path`, charging its bytes against `budget`.
///
/// Fails with [`ToolkitError::UploadTooLarge`] once the part needs more than
/// the remaining budget. Returns the number of bytes written.
pub async fn write_temp_file(
    mut field: Field,
    temp_path: &Path,
    budget: &mut u64,
) -> Result<u64, ToolkitError> {
    let temp_path_clone = temp_path.to_path_buf();
    let mut file = web::block(move || std::fs::File::create(&temp_path_clone)).await??;
    let mut written = 0u64;
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        let len = chunk.len() as u64;
        charge(budget, len)?;
        written += len;
        file = web::block(move || file.write_all(&chunk).map(|_| file)).await??;
    }
    Ok(written)
}
