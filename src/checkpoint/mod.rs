//! checkpoint: запись и чтение чекпоинтов тензоров поверх table.
//!
//! - key.rs      : ключ записи (имя + канонический слайс);
//! - record.rs   : заголовок значения записи;
//! - slice_set.rs: фрагменты одного тензора и проверка покрытия;
//! - copy.rs     : перенос области между буферами фрагмента и вызывающего;
//! - writer.rs / reader.rs: CheckpointWriter / CheckpointReader;
//! - save.rs     : пакетные save_tensors / save_tensor_slices;
//! - doctor.rs   : проверка целостности файла.

pub mod copy;
pub mod doctor;
pub mod key;
pub mod reader;
pub mod record;
pub mod save;
pub mod slice_set;
pub mod writer;

pub use doctor::{doctor, DoctorReport};
pub use reader::CheckpointReader;
pub use save::{
    save_tensor_slices, save_tensor_slices_with_config, save_tensors, save_tensors_with_config,
};
pub use slice_set::{DataLoc, SliceSet, StoredFragment};
pub use writer::{CheckpointWriter, WriteSummary};
