use nalgebra::Vector3;

use crate::scene::SourceFace;

/// Length below which an accumulated normal is left as the zero vector.
pub(crate) const NORMALIZE_THRESHOLD: f32 = 0.1;

/// Smooth per-vertex normals from an unweighted sum of face normals.
///
/// Faces with fewer than three indices contribute a zero normal. Indices
/// outside `positions` are ignored.
pub fn synthesize_normals(positions: &[[f32; 3]], faces: &[SourceFace]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vector3::<f32>::zeros(); positions.len()];

    for face in faces {
        let normal = face_normal(positions, &face.indices);
        for &index in &face.indices {
            if let Some(sum) = sums.get_mut(index as usize) {
                *sum += normal;
            }
        }
    }

    sums.into_iter()
        .map(|sum| {
            let length = sum.norm();
            let normal = if length > NORMALIZE_THRESHOLD {
                sum / length
            } else {
                Vector3::zeros()
            };
            [normal.x, normal.y, normal.z]
        })
        .collect()
}

/// Unnormalized `(v1 - v0) × (v2 - v0)`.
fn face_normal(positions: &[[f32; 3]], indices: &[u32]) -> Vector3<f32> {
    let [a, b, c, ..] = indices else {
        return Vector3::zeros();
    };
    let corner = |index: u32| positions.get(index as usize).map(|p| Vector3::from(*p));
    match (corner(*a), corner(*b), corner(*c)) {
        (Some(v0), Some(v1), Some(v2)) => (v1 - v0).cross(&(v2 - v0)),
        _ => Vector3::zeros(),
    }
}
