//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod record_repository;
mod reference_directory;
mod registration_command;
mod registration_query;
mod sequence_counter_repository;

#[cfg(test)]
pub use record_repository::MockRecordRepository;
pub use record_repository::{
    FixtureRecordRepository, InsertOutcome, NumberReservation, RecordInsert, RecordRepository,
    RecordRepositoryError, RecordUpdate, SupersessionWrite,
};
#[cfg(test)]
pub use reference_directory::MockReferenceDirectory;
pub use reference_directory::{
    FixtureReferenceDirectory, ReferenceDirectory, ReferenceDirectoryError,
};
#[cfg(test)]
pub use registration_command::MockRegistrationCommand;
pub use registration_command::{
    CreatedRecord, MetadataChange, RegistrationCommand, ScanDetails, SupersedeRequest,
    SupersededRecord,
};
#[cfg(test)]
pub use registration_query::MockRegistrationQuery;
pub use registration_query::{FixtureRegistrationQuery, RegistrationQuery};
#[cfg(test)]
pub use sequence_counter_repository::MockSequenceCounterRepository;
pub use sequence_counter_repository::{
    FixtureSequenceCounterRepository, SequenceCounterRepository, SequenceCounterRepositoryError,
};
