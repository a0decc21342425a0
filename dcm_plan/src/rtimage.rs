//! DICOM RT Image export of a fluence grid.

use chrono::Utc;
use dicom_core::{DataElement, PrimitiveValue, VR, dicom_value};
use dicom_dictionary_std::tags::{
    BITS_ALLOCATED, BITS_STORED, COLUMNS, HIGH_BIT, IMAGE_PLANE_PIXEL_SPACING, IMAGE_TYPE,
    MODALITY, PHOTOMETRIC_INTERPRETATION, PIXEL_DATA, PIXEL_REPRESENTATION, RESCALE_INTERCEPT,
    RESCALE_SLOPE, ROWS, RT_IMAGE_LABEL, RT_IMAGE_POSITION, SAMPLES_PER_PIXEL, SOP_CLASS_UID,
    SOP_INSTANCE_UID,
};
use dicom_dictionary_std::uids::RT_IMAGE_STORAGE;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use linac_tools_fluence::Fluence;
use std::path::Path;
use tracing::debug;

const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

#[derive(thiserror::Error, Debug)]
pub enum RtImageError {
    #[error("Failed to write DICOM file")]
    DicomWriteError(#[from] dicom_object::WriteError),
    #[error("Unable to assemble DICOM file meta table: {0}")]
    MetaError(String),
    #[error("Grid of {rows} x {cols} exceeds the 16-bit image size limit")]
    GridTooLarge { rows: usize, cols: usize },
}

/// Write `fluence` as a derived RT Image: 16-bit unsigned pixels scaled
/// into the grid's value range via RescaleSlope/RescaleIntercept.
pub fn write_rt_image<P: AsRef<Path>>(
    path: P,
    fluence: &Fluence,
    label: &str,
) -> Result<(), RtImageError> {
    let grid = fluence.grid();
    if grid.rows() > u16::MAX as usize || grid.cols() > u16::MAX as usize {
        return Err(RtImageError::GridTooLarge {
            rows: grid.rows(),
            cols: grid.cols(),
        });
    }

    let min = grid.min() as f64;
    let max = grid.max() as f64;
    let slope = if max > min {
        (max - min) / 65_535.0
    } else {
        1.0
    };
    let pixels: Vec<u16> = grid
        .data()
        .iter()
        .map(|&v| ((v as f64 - min) / slope).round() as u16)
        .collect();

    let sop_instance_uid = generate_uid();
    let dx_mm = grid.dx() * 10.0;
    let dy_mm = grid.dy() * 10.0;

    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(SOP_CLASS_UID, VR::UI, RT_IMAGE_STORAGE);
    obj.put_str(SOP_INSTANCE_UID, VR::UI, sop_instance_uid.as_str());
    obj.put_str(MODALITY, VR::CS, "RTIMAGE");
    obj.put_str(IMAGE_TYPE, VR::CS, "DERIVED\\SECONDARY\\FLUENCE");
    obj.put_str(RT_IMAGE_LABEL, VR::LO, label);
    obj.put(DataElement::new(
        SAMPLES_PER_PIXEL,
        VR::US,
        dicom_value!(U16, [1]),
    ));
    obj.put_str(PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
    obj.put(DataElement::new(
        ROWS,
        VR::US,
        dicom_value!(U16, [grid.rows() as u16]),
    ));
    obj.put(DataElement::new(
        COLUMNS,
        VR::US,
        dicom_value!(U16, [grid.cols() as u16]),
    ));
    obj.put(DataElement::new(
        BITS_ALLOCATED,
        VR::US,
        dicom_value!(U16, [16]),
    ));
    obj.put(DataElement::new(
        BITS_STORED,
        VR::US,
        dicom_value!(U16, [16]),
    ));
    obj.put(DataElement::new(HIGH_BIT, VR::US, dicom_value!(U16, [15])));
    obj.put(DataElement::new(
        PIXEL_REPRESENTATION,
        VR::US,
        dicom_value!(U16, [0]),
    ));
    obj.put_str(RESCALE_SLOPE, VR::DS, format!("{:.6}", slope));
    obj.put_str(RESCALE_INTERCEPT, VR::DS, format!("{:.6}", min));
    obj.put_str(
        IMAGE_PLANE_PIXEL_SPACING,
        VR::DS,
        format!("{:.3}\\{:.3}", dy_mm, dx_mm),
    );
    obj.put_str(
        RT_IMAGE_POSITION,
        VR::DS,
        format!(
            "{:.3}\\{:.3}",
            -0.5 * grid.cols() as f64 * dx_mm,
            -0.5 * grid.rows() as f64 * dy_mm
        ),
    );
    obj.put(DataElement::new(
        PIXEL_DATA,
        VR::OW,
        PrimitiveValue::U16(pixels.into()),
    ));

    let file_obj = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(RT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance_uid.as_str()),
        )
        .map_err(|e| RtImageError::MetaError(e.to_string()))?;
    file_obj.write_to_file(path.as_ref())?;
    debug!("wrote RT Image to {:?}", path.as_ref());
    Ok(())
}

/// A time-derived UID under the UUID root.
fn generate_uid() -> String {
    let now = Utc::now();
    format!(
        "2.25.{}{}",
        now.timestamp(),
        now.timestamp_subsec_micros()
    )
}
