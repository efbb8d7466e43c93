//! Initial schema: locations, files, tags and tag assignments

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Locations::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Locations::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Locations::Uuid).uuid().not_null().unique_key())
					.col(ColumnDef::new(Locations::Name).string().not_null())
					.col(ColumnDef::new(Locations::Path).string().not_null().unique_key())
					.col(ColumnDef::new(Locations::NodeId).uuid().not_null())
					.col(ColumnDef::new(Locations::VolumeFingerprint).string())
					.col(
						ColumnDef::new(Locations::IsOnline)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(ColumnDef::new(Locations::ScanState).string().not_null())
					.col(ColumnDef::new(Locations::LastScanAt).timestamp_with_time_zone())
					.col(ColumnDef::new(Locations::ErrorMessage).string())
					.col(
						ColumnDef::new(Locations::TotalFileCount)
							.big_integer()
							.not_null()
							.default(0),
					)
					.col(
						ColumnDef::new(Locations::TotalByteSize)
							.big_integer()
							.not_null()
							.default(0),
					)
					.col(
						ColumnDef::new(Locations::DateCreated)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Locations::DateModified)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Files::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Files::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Files::Uuid).uuid().not_null().unique_key())
					.col(ColumnDef::new(Files::LocationId).integer().not_null())
					.col(ColumnDef::new(Files::RelativePath).string().not_null())
					.col(ColumnDef::new(Files::Name).string().not_null())
					.col(ColumnDef::new(Files::Extension).string())
					.col(ColumnDef::new(Files::SizeBytes).big_integer().not_null())
					.col(ColumnDef::new(Files::CasId).string())
					.col(ColumnDef::new(Files::Inode).big_integer())
					.col(
						ColumnDef::new(Files::DateModified)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Files::LastScannedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.foreign_key(
						ForeignKey::create()
							.from(Files::Table, Files::LocationId)
							.to(Locations::Table, Locations::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Tags::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(Tags::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(Tags::Uuid).uuid().not_null().unique_key())
					.col(ColumnDef::new(Tags::Name).string().not_null())
					.col(ColumnDef::new(Tags::Color).string().not_null())
					.col(
						ColumnDef::new(Tags::DateCreated)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(TagOnFile::Table)
					.if_not_exists()
					.col(ColumnDef::new(TagOnFile::TagId).integer().not_null())
					.col(ColumnDef::new(TagOnFile::FileId).integer().not_null())
					.col(
						ColumnDef::new(TagOnFile::DateCreated)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(TagOnFile::TagId)
							.col(TagOnFile::FileId),
					)
					.foreign_key(
						ForeignKey::create()
							.from(TagOnFile::Table, TagOnFile::TagId)
							.to(Tags::Table, Tags::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.foreign_key(
						ForeignKey::create()
							.from(TagOnFile::Table, TagOnFile::FileId)
							.to(Files::Table, Files::Id)
							.on_delete(ForeignKeyAction::Cascade),
					)
					.to_owned(),
			)
			.await?;

		// Reconciliation looks files up by path within a location
		manager
			.create_index(
				Index::create()
					.name("idx_files_location_relative_path")
					.table(Files::Table)
					.col(Files::LocationId)
					.col(Files::RelativePath)
					.unique()
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_files_cas_id")
					.table(Files::Table)
					.col(Files::CasId)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_tag_on_file_file_id")
					.table(TagOnFile::Table)
					.col(TagOnFile::FileId)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(TagOnFile::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Tags::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Files::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Locations::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum Locations {
	Table,
	Id,
	Uuid,
	Name,
	Path,
	NodeId,
	VolumeFingerprint,
	IsOnline,
	ScanState,
	LastScanAt,
	ErrorMessage,
	TotalFileCount,
	TotalByteSize,
	DateCreated,
	DateModified,
}

#[derive(DeriveIden)]
enum Files {
	Table,
	Id,
	Uuid,
	LocationId,
	RelativePath,
	Name,
	Extension,
	SizeBytes,
	CasId,
	Inode,
	DateModified,
	LastScannedAt,
}

#[derive(DeriveIden)]
enum Tags {
	Table,
	Id,
	Uuid,
	Name,
	Color,
	DateCreated,
}

#[derive(DeriveIden)]
enum TagOnFile {
	Table,
	TagId,
	FileId,
	DateCreated,
}
