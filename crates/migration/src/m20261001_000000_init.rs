//! Initial schema migration - creates all tables from scratch.
//!
//! - `vehicles`: fleet vehicles and their operational state
//! - `missions`: scheduled vehicle usage
//! - `mission_expenses`: fuel and ancillary costs of a mission
//! - `maintenances`: workshop events
//! - `insurances`: insurance policies
//! - `insurance_coverages`: vehicles covered by each policy
//! - `member_accounts`: cooperative member accounts
//! - `movements`: append-only ledger entries

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Vehicles {
    Table,
    Id,
    Registration,
    State,
    StateChangedAt,
    AcquiredAt,
    AcquisitionPriceMinor,
    DistanceKm,
    Version,
}

#[derive(Iden)]
enum Missions {
    Table,
    Id,
    VehicleId,
    Label,
    Status,
    StartsAt,
    PlannedEndAt,
    EndedAt,
    PlannedDistanceKm,
    ActualDistanceKm,
    CostMinor,
    Observations,
}

#[derive(Iden)]
enum MissionExpenses {
    Table,
    Id,
    MissionId,
    Nature,
    AmountMinor,
    Justification,
    IncurredAt,
}

#[derive(Iden)]
enum Maintenances {
    Table,
    Id,
    VehicleId,
    Status,
    Category,
    Reason,
    EnteredAt,
    ExitedAt,
    CostMinor,
}

#[derive(Iden)]
enum Insurances {
    Table,
    Id,
    PolicyNumber,
    StartsAt,
    EndsAt,
    AnnualCostMinor,
}

#[derive(Iden)]
enum InsuranceCoverages {
    Table,
    InsuranceId,
    VehicleId,
}

#[derive(Iden)]
enum MemberAccounts {
    Table,
    Id,
    MemberRef,
    Number,
    BalanceMinor,
    Kind,
    Version,
    CreatedAt,
}

#[derive(Iden)]
enum Movements {
    Table,
    Id,
    AccountId,
    Kind,
    AmountMinor,
    OccurredAt,
    RecordedAt,
    Description,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Vehicles
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Vehicles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vehicles::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::Registration)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::State)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(Vehicles::StateChangedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Vehicles::AcquiredAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Vehicles::AcquisitionPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::DistanceKm)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Vehicles::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Missions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Missions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Missions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Missions::VehicleId).string().not_null())
                    .col(ColumnDef::new(Missions::Label).string().not_null())
                    .col(ColumnDef::new(Missions::Status).string().not_null())
                    .col(ColumnDef::new(Missions::StartsAt).timestamp().not_null())
                    .col(ColumnDef::new(Missions::PlannedEndAt).timestamp())
                    .col(ColumnDef::new(Missions::EndedAt).timestamp())
                    .col(
                        ColumnDef::new(Missions::PlannedDistanceKm)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Missions::ActualDistanceKm).big_integer())
                    .col(
                        ColumnDef::new(Missions::CostMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Missions::Observations).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-missions-vehicle_id")
                            .from(Missions::Table, Missions::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-missions-vehicle_id-status")
                    .table(Missions::Table)
                    .col(Missions::VehicleId)
                    .col(Missions::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Mission expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(MissionExpenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MissionExpenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MissionExpenses::MissionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MissionExpenses::Nature).string().not_null())
                    .col(
                        ColumnDef::new(MissionExpenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MissionExpenses::Justification).string())
                    .col(
                        ColumnDef::new(MissionExpenses::IncurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-mission_expenses-mission_id")
                            .from(MissionExpenses::Table, MissionExpenses::MissionId)
                            .to(Missions::Table, Missions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-mission_expenses-mission_id")
                    .table(MissionExpenses::Table)
                    .col(MissionExpenses::MissionId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Maintenances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Maintenances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Maintenances::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Maintenances::VehicleId).string().not_null())
                    .col(ColumnDef::new(Maintenances::Status).string().not_null())
                    .col(ColumnDef::new(Maintenances::Category).string().not_null())
                    .col(ColumnDef::new(Maintenances::Reason).string().not_null())
                    .col(
                        ColumnDef::new(Maintenances::EnteredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Maintenances::ExitedAt).timestamp())
                    .col(
                        ColumnDef::new(Maintenances::CostMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-maintenances-vehicle_id")
                            .from(Maintenances::Table, Maintenances::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-maintenances-vehicle_id-status")
                    .table(Maintenances::Table)
                    .col(Maintenances::VehicleId)
                    .col(Maintenances::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Insurances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Insurances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Insurances::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Insurances::PolicyNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Insurances::StartsAt).timestamp().not_null())
                    .col(ColumnDef::new(Insurances::EndsAt).timestamp())
                    .col(
                        ColumnDef::new(Insurances::AnnualCostMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Insurance coverages
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(InsuranceCoverages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InsuranceCoverages::InsuranceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InsuranceCoverages::VehicleId)
                            .string()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(InsuranceCoverages::InsuranceId)
                            .col(InsuranceCoverages::VehicleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-insurance_coverages-insurance_id")
                            .from(InsuranceCoverages::Table, InsuranceCoverages::InsuranceId)
                            .to(Insurances::Table, Insurances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-insurance_coverages-vehicle_id")
                            .from(InsuranceCoverages::Table, InsuranceCoverages::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-insurance_coverages-vehicle_id")
                    .table(InsuranceCoverages::Table)
                    .col(InsuranceCoverages::VehicleId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Member accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(MemberAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MemberAccounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MemberAccounts::MemberRef).string().not_null())
                    .col(
                        ColumnDef::new(MemberAccounts::Number)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(MemberAccounts::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(MemberAccounts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(MemberAccounts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MemberAccounts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Movements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Movements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Movements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Movements::AccountId).string().not_null())
                    .col(ColumnDef::new(Movements::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Movements::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Movements::Description).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-movements-account_id")
                            .from(Movements::Table, Movements::AccountId)
                            .to(MemberAccounts::Table, MemberAccounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-movements-account_id-recorded_at")
                    .table(Movements::Table)
                    .col(Movements::AccountId)
                    .col(Movements::RecordedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-movements-occurred_at")
                    .table(Movements::Table)
                    .col(Movements::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Movements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemberAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InsuranceCoverages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Insurances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Maintenances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MissionExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Missions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await?;
        Ok(())
    }
}
