//! Plain-text email templates.

use chrono::NaiveDate;
use ticketry_core::booking::format_cents;
use ticketry_core::types::{Cents, DbId};

use crate::email::OutgoingEmail;

/// One purchased seat category on a confirmation email.
#[derive(Debug, Clone)]
pub struct ConfirmationLine {
    pub label: String,
    pub num_seats: i32,
    pub price_per_seat: Cents,
    pub total: Cents,
}

/// Everything the booking confirmation email shows.
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub order_id: DbId,
    pub event_title: String,
    pub slot_date: NaiveDate,
    pub start_time: String,
    pub currency: String,
    pub lines: Vec<ConfirmationLine>,
    pub total: Cents,
}

impl BookingConfirmation {
    pub fn render(&self, to: &str) -> OutgoingEmail {
        let mut body = format!(
            "Your booking is confirmed.\n\n\
             Order: #{}\n\
             Event: {}\n\
             Date: {} at {}\n\n",
            self.order_id,
            self.event_title,
            self.slot_date.format("%A %-d %B %Y"),
            self.start_time,
        );
        for line in &self.lines {
            body.push_str(&format!(
                "  {} x {} @ {} {} = {} {}\n",
                line.num_seats,
                line.label,
                self.currency,
                format_cents(line.price_per_seat),
                self.currency,
                format_cents(line.total),
            ));
        }
        body.push_str(&format!(
            "\nTotal paid: {} {}\n",
            self.currency,
            format_cents(self.total)
        ));

        OutgoingEmail {
            to: to.to_string(),
            subject: format!("Booking confirmed: {}", self.event_title),
            body,
        }
    }
}
