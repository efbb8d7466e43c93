//! Locations
//!
//! A location is a directory registered for indexing. It belongs to exactly one
//! library and remembers which volume it lives on, so it can be taken offline
//! when that volume goes away.

mod error;
mod manager;

pub use error::LocationError;
pub use manager::LocationManager;

use crate::infra::{
	db::entities::location,
	event::{Event, EventBus},
};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};
use tracing::info;
use uuid::Uuid;

/// Persist a location's liveness, returns whether it changed.
///
/// `LocationOnlineChanged` is only emitted on an actual change.
pub(crate) async fn update_online_status<C: ConnectionTrait>(
	db: &C,
	events: &EventBus,
	library_id: Uuid,
	location_id: i32,
	is_online: bool,
) -> Result<bool, DbErr> {
	let Some(current) = location::Entity::find_by_id(location_id).one(db).await? else {
		return Err(DbErr::RecordNotFound(format!("location {location_id}")));
	};

	if current.is_online == is_online {
		return Ok(false);
	}

	let mut active: location::ActiveModel = current.into();
	active.is_online = Set(is_online);
	active.date_modified = Set(Utc::now());
	active.update(db).await?;

	info!(%library_id, location_id, is_online, "Location liveness changed");
	events.emit(Event::LocationOnlineChanged {
		library_id,
		location_id,
		is_online,
	});
	events.invalidate_query("locations.list");

	Ok(true)
}
