/*!
# Shop-floor Tracker

A QR-driven production tracking service. Operators scan the code printed on a
production box, pick the stage they just worked on, and the service records it
as cells of a shared spreadsheet.

## Overview

Every box has one tracking record: a row of the `getdata` sheet keyed by the
QR identifier in column A. Each operation owns a fixed run of columns in that
row, so a record fills up left to right as the box moves through production.

## Architecture

### Frontend Layer
- **Technologies**: HTML, JavaScript (served as static files)
- Scanner page, operation form, dropdowns fed by `/get-data`

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Operation Schema - Column span and field schedule of every operation
  - Validator - Required-field checks, including conditional fields
  - Upsert Engine - Locates, creates or updates a record
  - Dropdown Aggregator - Option lists from the reference sheet

### Data Persistence Layer
- Google Sheets values API (`sheets`), or an in-memory store for dry runs
- Per-call timeouts, no automatic retries

## Operations

| Operation | Stages | Columns |
|---|---|---|
| Production Details | - | B:D |
| Moved to Assembly | - | E |
| Order ID | - | F |
| Accessory | start / end | G / H |
| Assembly | start / end | I:J / K |
| QC | start / end | L:M / N:P |
| Rework | start / end | Q:R / S |
| Final QC | start / end | T:U / V:W |
| Screen Print and Flamming | - | X |
| Packing | - | Y |

## Modules

- **schema**: Operations, stages, descriptors and A1 addressing
- **payload**: Submitted form values
- **validator**: Submission checks
- **upsert**: Record create-or-update
- **store**: Record store trait and the in-memory store
- **sheets**: Google Sheets record store
- **dropdown**: Reference-data option lists
- **qr**: QR label text and shop-floor timestamps
- **config**: Environment configuration
- **app**: Routing and handlers

## REST API Endpoints

- `GET /get-data` - Dropdown option lists
- `POST /process-qr` - Apply one operation to a QR identifier
- `GET /operations` - Operation names and whether they are staged
- `POST /scan` - Decode scanned label text
- `POST /qr-label` - Encode label text for printing
*/

pub mod config;
pub mod dropdown;
pub mod error;
pub mod payload;
pub mod qr;
pub mod schema;
pub mod store;
pub mod upsert;
pub mod validator;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod sheets;

pub use error::*;
pub use payload::{FieldValue, Payload};
pub use schema::{CellRange, Column, ColumnSpan, Descriptor, Operation, Stage};
pub use store::{MemoryStore, RecordStore};
pub use upsert::{CreateLayout, LockPolicy, UpsertEngine, UpsertOutcome};
