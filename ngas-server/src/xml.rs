//! Renders the `NgamsStatus` XML document every command reply carries,
//! success or failure (§4.7 step 9, §6).

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use crate::infra::errors::StatusOutcome;

pub fn status_document(outcome: &StatusOutcome) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Start(BytesStart::new("NgamsStatus")))
        .expect("writing to an in-memory buffer cannot fail");

    match outcome {
        StatusOutcome::Success {
            file_id,
            file_version,
            disk_id,
            checksum,
            rate_bytes_per_sec,
        } => {
            let mut status = BytesStart::new("Status");
            status.push_attribute(("Status", "SUCCESS"));
            status.push_attribute(("Message", "Successfully handled archive request"));
            writer.write_event(Event::Empty(status)).unwrap();

            let mut file = BytesStart::new("File");
            file.push_attribute(("FileId", *file_id));
            file.push_attribute(("FileVersion", file_version.to_string().as_str()));
            file.push_attribute(("DiskId", *disk_id));
            file.push_attribute(("Checksum", checksum.to_string().as_str()));
            file.push_attribute(("ChecksumPlugin", "ngamsGenCrc32"));
            file.push_attribute(("IngestRate", format!("{rate_bytes_per_sec:.2}").as_str()));
            writer.write_event(Event::Empty(file)).unwrap();
        }
        StatusOutcome::Failure { status, message } => {
            let mut el = BytesStart::new("Status");
            el.push_attribute(("Status", "FAILURE"));
            el.push_attribute(("Message", message.as_ref()));
            el.push_attribute(("HttpStatus", status.as_u16().to_string().as_str()));
            writer.write_event(Event::Empty(el)).unwrap();
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("NgamsStatus")))
        .unwrap();

    String::from_utf8(writer.into_inner()).expect("quick-xml only ever writes valid UTF-8")
}

/// Renders a status document covering several files, used by the multipart
/// container handler (one logical archive request, many stored files).
pub fn container_status_document(files: &[(String, i32, String, u32)]) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new("NgamsStatus")))
        .unwrap();

    let mut status = BytesStart::new("Status");
    status.push_attribute(("Status", "SUCCESS"));
    status.push_attribute(("Message", "Successfully handled container archive request"));
    writer.write_event(Event::Empty(status)).unwrap();

    writer
        .write_event(Event::Start(BytesStart::new("FileList")))
        .unwrap();
    for (file_id, file_version, disk_id, checksum) in files {
        let mut file = BytesStart::new("File");
        file.push_attribute(("FileId", file_id.as_str()));
        file.push_attribute(("FileVersion", file_version.to_string().as_str()));
        file.push_attribute(("DiskId", disk_id.as_str()));
        file.push_attribute(("Checksum", checksum.to_string().as_str()));
        writer.write_event(Event::Empty(file)).unwrap();
    }
    writer
        .write_event(Event::End(BytesEnd::new("FileList")))
        .unwrap();

    writer
        .write_event(Event::End(BytesEnd::new("NgamsStatus")))
        .unwrap();

    String::from_utf8(writer.into_inner()).unwrap()
}

/// Renders the reply to the `STATUS` command: just an online/offline and
/// archiving-permitted summary, no file identity involved.
pub fn server_status_document(archiving_allowed: bool) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new("NgamsStatus")))
        .unwrap();

    let mut status = BytesStart::new("Status");
    status.push_attribute(("Status", "SUCCESS"));
    status.push_attribute(("State", "ONLINE"));
    status.push_attribute((
        "ArchivingAllowed",
        if archiving_allowed { "1" } else { "0" },
    ));
    writer.write_event(Event::Empty(status)).unwrap();

    writer
        .write_event(Event::End(BytesEnd::new("NgamsStatus")))
        .unwrap();
    String::from_utf8(writer.into_inner()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_document_carries_file_identity() {
        let doc = status_document(&StatusOutcome::Success {
            file_id: "X1",
            file_version: 1,
            disk_id: "disk-1",
            checksum: 2535050025,
            rate_bytes_per_sec: 1024.0,
        });
        assert!(doc.contains("FileId=\"X1\""));
        assert!(doc.contains("Checksum=\"2535050025\""));
        assert!(doc.contains("Status=\"SUCCESS\""));
    }

    #[test]
    fn failure_document_carries_message() {
        let doc = status_document(&StatusOutcome::Failure {
            status: axum::http::StatusCode::BAD_REQUEST,
            message: "missing file URI",
        });
        assert!(doc.contains("Status=\"FAILURE\""));
        assert!(doc.contains("missing file URI"));
    }
}
