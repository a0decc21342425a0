//! RT Plan reading on top of `dicom-object`.

use crate::model::{
    BeamLimitingDevice, DevicePositions, FractionGroup, LimitingDeviceTypeError, PlanBeam,
    PlanControlPoint, ReferencedBeam, RtPlan, Sop,
};
use dicom_core::Tag;
use dicom_core::value::{CastValueError, ConvertValueError, Value};
use dicom_dictionary_std::tags::{
    BEAM_LIMITING_DEVICE_ANGLE, BEAM_LIMITING_DEVICE_POSITION_SEQUENCE,
    BEAM_LIMITING_DEVICE_SEQUENCE, BEAM_METERSET, BEAM_NAME, BEAM_NUMBER, BEAM_SEQUENCE,
    CONTROL_POINT_INDEX, CONTROL_POINT_SEQUENCE, CUMULATIVE_METERSET_WEIGHT,
    FINAL_CUMULATIVE_METERSET_WEIGHT, FRACTION_GROUP_NUMBER, FRACTION_GROUP_SEQUENCE,
    GANTRY_ANGLE, LEAF_JAW_POSITIONS, LEAF_POSITION_BOUNDARIES, NUMBER_OF_LEAF_JAW_PAIRS,
    REFERENCED_BEAM_NUMBER, REFERENCED_BEAM_SEQUENCE, RT_BEAM_LIMITING_DEVICE_TYPE,
    RT_PLAN_LABEL, RT_PLAN_NAME, SOP_CLASS_UID, SOP_INSTANCE_UID,
};
use dicom_dictionary_std::uids::RT_PLAN_STORAGE;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use std::path::Path;
use std::str::FromStr;
use tracing::trace;

#[derive(thiserror::Error, Debug)]
pub enum DcmPlanError {
    #[error("Failed to read DICOM file")]
    DicomReadError(#[from] dicom_object::ReadError),
    #[error("Unable to find DICOM element")]
    DicomElementAccessError(#[from] dicom_object::AccessError),
    #[error("Unable to convert value from DICOM element")]
    ConvertValueError(#[from] ConvertValueError),
    #[error("Unable to cast internal DICOM value to the requested data type.")]
    CastValueError(#[from] CastValueError),
    #[error("Element read with tag [{0:#?}] is not a sequence")]
    ElementIsNotSequence(Tag),
    #[error("Reader doesn't match with SOP class UID: [{0:#?}]")]
    NoMatchingSopClassUID(String),
    #[error("Unable to create beam limiting device type from DICOM element")]
    LimitingDeviceTypeError(#[from] LimitingDeviceTypeError),
}

pub(crate) fn to_string(obj: &InMemDicomObject, tag: Tag) -> Result<String, DcmPlanError> {
    Ok(obj.element(tag)?.to_str()?.trim().to_string())
}

pub(crate) fn to_string_opt(
    obj: &InMemDicomObject,
    tag: Tag,
) -> Result<Option<String>, DcmPlanError> {
    match obj.element_opt(tag)? {
        None => Ok(None),
        Some(elem) => Ok(Some(elem.to_str()?.trim().to_string())),
    }
}

pub(crate) fn to_f64(obj: &InMemDicomObject, tag: Tag) -> Result<f64, DcmPlanError> {
    Ok(obj.element(tag)?.to_float64()?)
}

pub(crate) fn to_f64_opt(obj: &InMemDicomObject, tag: Tag) -> Result<Option<f64>, DcmPlanError> {
    match obj.element_opt(tag)? {
        None => Ok(None),
        Some(elem) => Ok(Some(elem.to_float64()?)),
    }
}

pub(crate) fn to_f64s(obj: &InMemDicomObject, tag: Tag) -> Result<Vec<f64>, DcmPlanError> {
    Ok(obj.element(tag)?.to_multi_float64()?)
}

pub(crate) fn to_f64s_opt(
    obj: &InMemDicomObject,
    tag: Tag,
) -> Result<Option<Vec<f64>>, DcmPlanError> {
    match obj.element_opt(tag)? {
        None => Ok(None),
        Some(elem) => Ok(Some(elem.to_multi_float64()?)),
    }
}

pub(crate) fn to_i32(obj: &InMemDicomObject, tag: Tag) -> Result<i32, DcmPlanError> {
    Ok(obj.element(tag)?.to_int::<i32>()?)
}

pub(crate) fn from_seq<T, F>(
    obj: &InMemDicomObject,
    seq_tag: Tag,
    func: F,
) -> Result<Vec<T>, DcmPlanError>
where
    F: Fn(&InMemDicomObject) -> Result<T, DcmPlanError>,
{
    let seq = obj.element(seq_tag)?;
    let mut v = Vec::new();
    match seq.value() {
        Value::Primitive(_) => {
            return Err(DcmPlanError::ElementIsNotSequence(seq_tag));
        }
        Value::Sequence(sq) => {
            for item in sq.items() {
                v.push(func(item)?);
            }
        }
        Value::PixelSequence(_) => {
            return Err(DcmPlanError::ElementIsNotSequence(seq_tag));
        }
    }
    Ok(v)
}

pub(crate) fn from_seq_opt<T, F>(
    obj: &InMemDicomObject,
    seq_tag: Tag,
    func: F,
) -> Result<Vec<T>, DcmPlanError>
where
    F: Fn(&InMemDicomObject) -> Result<T, DcmPlanError>,
{
    if obj.element_opt(seq_tag)?.is_none() {
        return Ok(Vec::new());
    }
    from_seq(obj, seq_tag, func)
}

/// Reads an RT Plan from a file at the given path.
pub fn read_rtplan<P: AsRef<Path>>(path: P) -> Result<RtPlan, DcmPlanError> {
    let file_obj = dicom_object::open_file(path.as_ref())?;
    obj_to_rtplan(file_obj)
}

/// Converts a DICOM object to an [`RtPlan`], rejecting other SOP classes.
pub fn obj_to_rtplan(obj: DefaultDicomObject) -> Result<RtPlan, DcmPlanError> {
    let obj = obj.into_inner();
    let sop_class_uid = to_string(&obj, SOP_CLASS_UID)?;
    if sop_class_uid != RT_PLAN_STORAGE {
        return Err(DcmPlanError::NoMatchingSopClassUID(sop_class_uid));
    }
    trace!("reading RT Plan {:?}", &sop_class_uid);

    Ok(RtPlan {
        sop: Sop {
            class_uid: sop_class_uid,
            instance_uid: to_string(&obj, SOP_INSTANCE_UID)?,
        },
        label: to_string(&obj, RT_PLAN_LABEL)?,
        name: to_string_opt(&obj, RT_PLAN_NAME)?,
        fraction_groups: from_seq_opt(&obj, FRACTION_GROUP_SEQUENCE, fraction_group_item)?,
        beams: from_seq(&obj, BEAM_SEQUENCE, beam_item)?,
    })
}

fn fraction_group_item(item: &InMemDicomObject) -> Result<FractionGroup, DcmPlanError> {
    Ok(FractionGroup {
        fraction_group_number: to_i32(item, FRACTION_GROUP_NUMBER)?,
        referenced_beams: from_seq_opt(item, REFERENCED_BEAM_SEQUENCE, referenced_beam_item)?,
    })
}

fn referenced_beam_item(item: &InMemDicomObject) -> Result<ReferencedBeam, DcmPlanError> {
    Ok(ReferencedBeam {
        referenced_beam_number: to_i32(item, REFERENCED_BEAM_NUMBER)?,
        beam_meterset: to_f64_opt(item, BEAM_METERSET)?,
    })
}

fn beam_item(item: &InMemDicomObject) -> Result<PlanBeam, DcmPlanError> {
    Ok(PlanBeam {
        beam_number: to_i32(item, BEAM_NUMBER)?,
        name: to_string_opt(item, BEAM_NAME)?,
        limiting_devices: from_seq(item, BEAM_LIMITING_DEVICE_SEQUENCE, limiting_device_item)?,
        final_cumulative_meterset_weight: to_f64(item, FINAL_CUMULATIVE_METERSET_WEIGHT)?,
        control_points: from_seq(item, CONTROL_POINT_SEQUENCE, control_point_item)?,
    })
}

fn limiting_device_item(item: &InMemDicomObject) -> Result<BeamLimitingDevice, DcmPlanError> {
    Ok(BeamLimitingDevice {
        device_type: FromStr::from_str(&to_string(item, RT_BEAM_LIMITING_DEVICE_TYPE)?)?,
        number_of_leaf_jaw_pairs: to_i32(item, NUMBER_OF_LEAF_JAW_PAIRS)?,
        leaf_position_boundaries: to_f64s_opt(item, LEAF_POSITION_BOUNDARIES)?,
    })
}

fn device_positions_item(item: &InMemDicomObject) -> Result<DevicePositions, DcmPlanError> {
    Ok(DevicePositions {
        device_type: FromStr::from_str(&to_string(item, RT_BEAM_LIMITING_DEVICE_TYPE)?)?,
        positions: to_f64s(item, LEAF_JAW_POSITIONS)?,
    })
}

fn control_point_item(item: &InMemDicomObject) -> Result<PlanControlPoint, DcmPlanError> {
    Ok(PlanControlPoint {
        index: to_i32(item, CONTROL_POINT_INDEX)?,
        gantry_angle: to_f64_opt(item, GANTRY_ANGLE)?,
        collimator_angle: to_f64_opt(item, BEAM_LIMITING_DEVICE_ANGLE)?,
        cumulative_meterset_weight: to_f64_opt(item, CUMULATIVE_METERSET_WEIGHT)?,
        device_positions: from_seq_opt(
            item,
            BEAM_LIMITING_DEVICE_POSITION_SEQUENCE,
            device_positions_item,
        )?,
    })
}
