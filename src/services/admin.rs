use chrono::NaiveDate;

use crate::{
    error::Result,
    models::booking::BookingRecord,
    repositories::store::BookingStore,
};

const CSV_HEADER: &str = "event_date,activity,start_time,end_time,full_name,phone,email,created_at\n";

/// Lists the bookings made for sessions on `date`.
pub async fn bookings_on(store: &dyn BookingStore, date: NaiveDate) -> Result<Vec<BookingRecord>> {
    let bookings = store.bookings_on(date).await?;
    tracing::info!("📋 Admin listed {} bookings for {}", bookings.len(), date);
    Ok(bookings)
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Renders bookings as CSV, one row per booking under a header row.
pub fn render_csv(bookings: &[BookingRecord]) -> String {
    let mut csv = String::from(CSV_HEADER);
    for b in bookings {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            b.event_date.format("%Y-%m-%d"),
            escape_csv(&b.activity),
            b.start_time.format("%H:%M"),
            b.end_time.format("%H:%M"),
            escape_csv(&b.full_name),
            escape_csv(&b.phone),
            escape_csv(&b.email),
            b.created_at.to_rfc3339(),
        ));
    }
    csv
}

/// The download name of the export for `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("bookings_{}.csv", date.format("%Y-%m-%d"))
}
