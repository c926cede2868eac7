//! Task attachments and editor image uploads.
//!
//! Uploads carry their files as [`FormPart`]s inside the re-sendable [`ApiRequest`], so a
//! credential-expiry retry sends the same files again.

pub use crate::http::UploadFile;

// self
use crate::{
	_prelude::*,
	api,
	coordinator::TokenCoordinator,
	http::{ApiRequest, ApiTransport, FormPart, OCTET_STREAM, header},
};

const DEFAULT_FILE_NAME: &str = "file";

/// Attachment metadata returned by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
	/// Attachment identifier.
	pub id: i64,
	/// File name as uploaded.
	pub original_filename: String,
	/// MIME type recorded by the server.
	#[serde(default)]
	pub content_type: Option<String>,
	/// Size in bytes.
	#[serde(default)]
	pub size_bytes: Option<u64>,
	/// Server storage path or public URL.
	#[serde(default)]
	pub storage_path: Option<String>,
}

/// Downloaded attachment contents with the name it should be saved under.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedFile {
	/// Resolved file name.
	pub file_name: String,
	/// MIME type reported by the server.
	pub content_type: String,
	/// File contents.
	pub bytes: Vec<u8>,
}
impl Debug for DownloadedFile {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DownloadedFile")
			.field("file_name", &self.file_name)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

#[derive(Deserialize)]
struct ImageUploadBody {
	url: String,
}

/// Attachment and image upload endpoints.
pub struct AttachmentApi<T>
where
	T: ?Sized + ApiTransport,
{
	coordinator: TokenCoordinator<T>,
}
impl<T> AttachmentApi<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a consumer sharing `coordinator`'s token state.
	pub fn new(coordinator: TokenCoordinator<T>) -> Self {
		Self { coordinator }
	}

	/// Uploads `files` to a task as the repeated `files` form field.
	pub async fn upload(&self, task_id: i64, files: &[UploadFile]) -> Result<Vec<Attachment>> {
		let parts = files.iter().map(|file| FormPart::new("files", file.clone())).collect();
		let request =
			ApiRequest::post(format!("/api/tasks/{task_id}/attachments")).multipart(parts);

		api::fetch_json(&self.coordinator, request).await
	}

	/// Soft-deletes an attachment.
	pub async fn delete(&self, attachment_id: i64) -> Result<()> {
		let request = ApiRequest::delete(format!("/api/attachments/{attachment_id}"));

		api::send_checked(&self.coordinator, request).await?;

		Ok(())
	}

	/// Downloads an attachment.
	///
	/// The file name comes from the response's `Content-Disposition`, then `fallback_name`, then
	/// `"file"`.
	pub async fn download(
		&self,
		attachment_id: i64,
		fallback_name: Option<&str>,
	) -> Result<DownloadedFile> {
		let request = ApiRequest::get(format!("/api/attachments/{attachment_id}/download"));
		let response = api::send_checked(&self.coordinator, request).await?;
		let file_name = response
			.header_str(header::CONTENT_DISPOSITION)
			.and_then(file_name_from_disposition)
			.or_else(|| fallback_name.filter(|name| !name.is_empty()).map(str::to_owned))
			.unwrap_or_else(|| DEFAULT_FILE_NAME.to_owned());
		let content_type =
			response.header_str(header::CONTENT_TYPE).unwrap_or(OCTET_STREAM).to_owned();

		Ok(DownloadedFile { file_name, content_type, bytes: response.body })
	}

	/// Uploads an editor image and returns the URL the server serves it from.
	pub async fn upload_image(&self, file: &UploadFile) -> Result<String> {
		let request = ApiRequest::post("/api/uploads/images")
			.multipart(vec![FormPart::new("file", file.clone())]);
		let body: ImageUploadBody = api::fetch_json(&self.coordinator, request).await?;

		Ok(body.url)
	}
}
impl<T> Clone for AttachmentApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone() }
	}
}
impl<T> Debug for AttachmentApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AttachmentApi").field("coordinator", &self.coordinator).finish()
	}
}

/// Extracts the file name from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=UTF-8''…` form wins over a plain `filename=`; an extended value that
/// fails to decode falls back to the plain one.
pub fn file_name_from_disposition(value: &str) -> Option<String> {
	let mut plain = None;

	for param in split_params(value) {
		let Some((name, raw)) = param.split_once('=') else {
			continue;
		};
		let name = name.trim();
		let raw = unquote(raw.trim());

		if name.eq_ignore_ascii_case("filename*")
			&& let Some(decoded) = decode_extended(raw)
		{
			return Some(decoded);
		} else if name.eq_ignore_ascii_case("filename") && plain.is_none() {
			plain = Some(raw.trim().to_owned()).filter(|name| !name.is_empty());
		}
	}

	plain
}

fn split_params(value: &str) -> Vec<&str> {
	let mut params = Vec::new();
	let mut quoted = false;
	let mut start = 0;

	for (i, c) in value.char_indices() {
		match c {
			'"' => quoted = !quoted,
			';' if !quoted => {
				params.push(&value[start..i]);
				start = i + 1;
			},
			_ => {},
		}
	}

	params.push(&value[start..]);

	params
}

fn unquote(value: &str) -> &str {
	value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

fn decode_extended(value: &str) -> Option<String> {
	let mut parts = value.splitn(3, '\'');
	let charset = parts.next()?;
	let _language = parts.next()?;
	let encoded = parts.next()?;

	if !charset.trim().eq_ignore_ascii_case("utf-8") {
		return None;
	}

	urlencoding::decode(encoded.trim())
		.ok()
		.map(|name| name.into_owned())
		.filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn extended_file_name_wins() {
		let header =
			"attachment; filename=\"report.pdf\"; filename*=UTF-8''%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf";

		assert_eq!(file_name_from_disposition(header).as_deref(), Some("보고서.pdf"));
	}

	#[test]
	fn plain_file_name_is_unquoted() {
		assert_eq!(
			file_name_from_disposition("attachment; filename=\"a; b.txt\"").as_deref(),
			Some("a; b.txt")
		);
		assert_eq!(
			file_name_from_disposition("attachment; FILENAME=notes.md").as_deref(),
			Some("notes.md")
		);
	}

	#[test]
	fn broken_extended_value_falls_back_to_plain() {
		let header = "attachment; filename*=UTF-8''%FF%FE; filename=\"fallback.bin\"";

		assert_eq!(file_name_from_disposition(header).as_deref(), Some("fallback.bin"));
		assert_eq!(file_name_from_disposition("attachment"), None);
		assert_eq!(file_name_from_disposition("attachment; filename=\"\""), None);
	}
}
