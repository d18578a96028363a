//! Embedded reference images.
//!
//! Two small 3×4 images. The first is the default reference frame written and
//! checked by the SWMR tools; the second differs in every sample.

/// Shape of the embedded images.
pub const IMAGE_SHAPE: [usize; 2] = [3, 4];

/// Default reference image, row-major.
pub const REFERENCE_IMAGE: [u32; 12] = [
    1, 45, 343, 675, //
    643, 2143, 875, 34, //
    842, 482, 5000, 3762,
];

/// A second image of the same shape.
pub const SECOND_IMAGE: [u32; 12] = [
    2, 4346, 54322, 2354, //
    35521, 3462, 34333, 7674, //
    41, 5532, 563, 84,
];
