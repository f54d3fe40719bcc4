//! Rooms and reservations
//!
//! Role checks here only keep users from sending requests the server would
//! refuse; the server stays authoritative.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use validator::Validate;

use roombook_protocol::{Reservation, ReservationPayload, Room, RoomPayload};

use crate::calendar;
use crate::client::BookingApi;
use crate::error::{Result, RoombookError};
use crate::session::AuthSession;
use crate::utils::{next_upcoming, parse_date};

/// Room name used when the reserved room is not in the inventory
pub const FALLBACK_ROOM_NAME: &str = "Sala reservada";

/// Dashboard figures for the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub rooms: usize,
    pub reservations: usize,
    pub upcoming: Option<Reservation>,
}

/// Outcome of a successful reservation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationReceipt {
    pub room_name: String,
    pub calendar_link: Option<String>,
}

pub struct BookingService<'a, C: BookingApi> {
    api: &'a C,
}

impl<'a, C: BookingApi> BookingService<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }

    pub async fn rooms(&self, session: &AuthSession) -> Result<Vec<Room>> {
        self.api.rooms(&session.token).await
    }

    pub async fn create_room(&self, session: &AuthSession, name: &str) -> Result<Room> {
        require_admin(session)?;
        let payload = room_payload(name)?;
        let room = self.api.create_room(&session.token, &payload.name).await?;
        info!(id = %room.id, name = %room.name, "room created");
        Ok(room)
    }

    pub async fn rename_room(&self, session: &AuthSession, id: &str, name: &str) -> Result<Room> {
        require_admin(session)?;
        let payload = room_payload(name)?;
        let room = self
            .api
            .update_room(&session.token, id, &payload.name)
            .await?;
        info!(id = %room.id, name = %room.name, "room renamed");
        Ok(room)
    }

    pub async fn delete_room(&self, session: &AuthSession, id: &str) -> Result<()> {
        require_admin(session)?;
        self.api.delete_room(&session.token, id).await?;
        info!(id, "room deleted");
        Ok(())
    }

    /// Send a reservation request and build its calendar link.
    pub async fn reserve(
        &self,
        session: &AuthSession,
        payload: &ReservationPayload,
    ) -> Result<ReservationReceipt> {
        payload.validate()?;
        if parse_date(&payload.date).is_none() {
            return Err(RoombookError::validation_field(
                format!("invalid date '{}', expected YYYY-MM-DD", payload.date),
                "date",
            ));
        }

        self.api.create_reservation(&session.token, payload).await?;
        info!(room = %payload.room.id, date = %payload.date, "reservation created");

        // the link is a convenience; an unreachable inventory must not fail the request
        let room_name = match self.api.rooms(&session.token).await {
            Ok(rooms) => rooms
                .into_iter()
                .find(|room| room.id == payload.room.id)
                .map(|room| room.name),
            Err(e) => {
                debug!("Could not resolve room name: {}", e);
                None
            }
        }
        .unwrap_or_else(|| FALLBACK_ROOM_NAME.to_string());

        let calendar_link = calendar::calendar_link(payload, &room_name);
        Ok(ReservationReceipt {
            room_name,
            calendar_link,
        })
    }

    /// Reservations visible to the session: admins see a given date or the
    /// full history, everyone else their own.
    pub async fn reservations(
        &self,
        session: &AuthSession,
        date: Option<&str>,
    ) -> Result<Vec<Reservation>> {
        if !session.is_admin() {
            return self.api.my_reservations(&session.token).await;
        }

        match date.map(str::trim).filter(|date| !date.is_empty()) {
            Some(date) => {
                if parse_date(date).is_none() {
                    return Err(RoombookError::validation_field(
                        format!("invalid date '{}', expected YYYY-MM-DD", date),
                        "date",
                    ));
                }
                self.api.reservations_by_date(&session.token, date).await
            }
            None => self.api.reservation_history(&session.token).await,
        }
    }

    /// Look a reservation up among those visible to the session.
    pub async fn find_reservation(&self, session: &AuthSession, id: &str) -> Result<Reservation> {
        self.reservations(session, None)
            .await?
            .into_iter()
            .find(|reservation| reservation.id == id)
            .ok_or_else(|| RoombookError::reservation_not_found(id))
    }

    pub async fn overview(&self, session: &AuthSession, now: DateTime<Utc>) -> Result<Overview> {
        let (rooms, reservations) =
            tokio::try_join!(self.rooms(session), self.reservations(session, None))?;
        let upcoming = next_upcoming(&reservations, now).cloned();

        Ok(Overview {
            rooms: rooms.len(),
            reservations: reservations.len(),
            upcoming,
        })
    }
}

fn require_admin(session: &AuthSession) -> Result<()> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(RoombookError::authorization(
            "only administrators can manage rooms",
        ))
    }
}

fn room_payload(name: &str) -> Result<RoomPayload> {
    let payload = RoomPayload {
        name: name.trim().to_string(),
    };
    payload.validate()?;
    Ok(payload)
}
