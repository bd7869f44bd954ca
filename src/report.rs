use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::models::{FormField, Payment};

pub const SHEET_NAME: &str = "Payments";
pub const FILE_NAME: &str = "payments_report.xlsx";
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn headers() -> Vec<&'static str> {
    let mut headers = Vec::with_capacity(FormField::ALL.len() + 2);
    headers.push("ID");
    headers.extend(FormField::ALL.map(FormField::label));
    headers.push("Registered at");
    headers
}

pub fn build_report(payments: &[Payment]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = build_workbook(payments)?;
    workbook.save_to_buffer()
}

pub fn write_report(path: &Path, payments: &[Payment]) -> Result<(), XlsxError> {
    let mut workbook = build_workbook(payments)?;
    workbook.save(path)
}

fn build_workbook(payments: &[Payment]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in headers().into_iter().enumerate() {
        worksheet.write_string_with_format(0, column(col), header, &bold)?;
    }

    for (index, payment) in payments.iter().enumerate() {
        write_row(worksheet, row(index + 1), payment)?;
    }

    worksheet.autofit();
    Ok(workbook)
}

fn write_row(worksheet: &mut Worksheet, row: u32, payment: &Payment) -> Result<(), XlsxError> {
    worksheet.write_number(row, 0, f64::from(payment.id))?;

    let fields = payment.labelled_fields();
    for (offset, (_, value)) in fields.iter().enumerate() {
        worksheet.write_string(row, column(offset + 1), *value)?;
    }

    let registered_at = payment.registered_at.format(TIMESTAMP_FORMAT).to_string();
    worksheet.write_string(row, column(fields.len() + 1), registered_at)?;
    Ok(())
}

// The sheet never has more than a dozen columns.
fn column(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

fn row(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
