//! Mesh quantities and carrier fluid state consumed by the injection.

use crate::schema::{BoxMesh, BoxSide, ZoneKind};

/// Geometric quantities of the local mesh partition.
///
/// Boundary face normals point out of the domain and are unit vectors.
pub trait Mesh {
    fn n_cells(&self) -> usize;

    fn n_b_faces(&self) -> usize;

    fn cell_volumes(&self) -> &[f64];

    fn b_face_surfaces(&self) -> &[f64];

    fn cell_center(&self, cell_id: usize) -> [f64; 3];

    fn b_face_center(&self, face_id: usize) -> [f64; 3];

    fn b_face_normal(&self, face_id: usize) -> [f64; 3];

    /// Cell adjacent to a boundary face.
    fn b_face_cell(&self, face_id: usize) -> usize;

    /// Cell containing a point, if the point lies in the local partition.
    fn locate_cell(&self, point: [f64; 3]) -> Option<usize>;

    /// Sampling weights of the elements of a location.
    fn element_weights(&self, kind: ZoneKind) -> &[f64] {
        match kind {
            ZoneKind::BoundaryFaces => self.b_face_surfaces(),
            ZoneKind::VolumeCells => self.cell_volumes(),
        }
    }
}

/// Explicit mesh storage.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub cell_centers: Vec<[f64; 3]>,
    pub cell_volumes: Vec<f64>,
    pub b_face_centers: Vec<[f64; 3]>,
    pub b_face_normals: Vec<[f64; 3]>,
    pub b_face_surfaces: Vec<f64>,
    pub b_face_cells: Vec<usize>,
    /// Structured layout, used for direct point location.
    grid: Option<BoxMesh>,
}

impl MeshData {
    /// Build the cells and boundary faces of a structured box.
    pub fn from_box(spec: &BoxMesh) -> Self {
        let n = spec.n;
        let d = [
            spec.lengths[0] / n[0].max(1) as f64,
            spec.lengths[1] / n[1].max(1) as f64,
            spec.lengths[2] / n[2].max(1) as f64,
        ];
        let cell_id = |i: usize, j: usize, k: usize| i + n[0] * (j + n[1] * k);

        let n_cells = spec.n_cells();
        let mut cell_centers = Vec::with_capacity(n_cells);
        for k in 0..n[2] {
            for j in 0..n[1] {
                for i in 0..n[0] {
                    cell_centers.push([
                        (i as f64 + 0.5) * d[0],
                        (j as f64 + 0.5) * d[1],
                        (k as f64 + 0.5) * d[2],
                    ]);
                }
            }
        }
        let cell_volumes = vec![d[0] * d[1] * d[2]; n_cells];

        let n_b_faces = spec.n_b_faces();
        let mut b_face_centers = Vec::with_capacity(n_b_faces);
        let mut b_face_normals = Vec::with_capacity(n_b_faces);
        let mut b_face_surfaces = Vec::with_capacity(n_b_faces);
        let mut b_face_cells = Vec::with_capacity(n_b_faces);

        for side in BoxSide::ALL {
            let axis = side.axis();
            let (a, b) = BoxMesh::tangential_axes(side);
            let layer = if side.is_max() { n[axis].saturating_sub(1) } else { 0 };
            let mut normal = [0.0; 3];
            normal[axis] = if side.is_max() { 1.0 } else { -1.0 };

            for jb in 0..n[b] {
                for ia in 0..n[a] {
                    let mut idx = [0usize; 3];
                    idx[axis] = layer;
                    idx[a] = ia;
                    idx[b] = jb;

                    let mut center = [0.0; 3];
                    center[axis] = if side.is_max() { spec.lengths[axis] } else { 0.0 };
                    center[a] = (ia as f64 + 0.5) * d[a];
                    center[b] = (jb as f64 + 0.5) * d[b];

                    b_face_centers.push(center);
                    b_face_normals.push(normal);
                    b_face_surfaces.push(d[a] * d[b]);
                    b_face_cells.push(cell_id(idx[0], idx[1], idx[2]));
                }
            }
        }

        Self {
            cell_centers,
            cell_volumes,
            b_face_centers,
            b_face_normals,
            b_face_surfaces,
            b_face_cells,
            grid: Some(spec.clone()),
        }
    }

    fn locate_in_grid(grid: &BoxMesh, point: [f64; 3]) -> Option<usize> {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let x = point[axis];
            let len = grid.lengths[axis];
            if !(0.0..=len).contains(&x) {
                return None;
            }
            let n = grid.n[axis];
            let i = (x / len * n as f64) as usize;
            idx[axis] = i.min(n.saturating_sub(1));
        }
        Some(idx[0] + grid.n[0] * (idx[1] + grid.n[1] * idx[2]))
    }

    fn nearest_cell(&self, point: [f64; 3]) -> Option<usize> {
        self.cell_centers
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let d2: f64 = (0..3).map(|k| (c[k] - point[k]).powi(2)).sum();
                (i, d2)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

impl Mesh for MeshData {
    fn n_cells(&self) -> usize {
        self.cell_volumes.len()
    }

    fn n_b_faces(&self) -> usize {
        self.b_face_surfaces.len()
    }

    fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    fn b_face_surfaces(&self) -> &[f64] {
        &self.b_face_surfaces
    }

    fn cell_center(&self, cell_id: usize) -> [f64; 3] {
        self.cell_centers[cell_id]
    }

    fn b_face_center(&self, face_id: usize) -> [f64; 3] {
        self.b_face_centers[face_id]
    }

    fn b_face_normal(&self, face_id: usize) -> [f64; 3] {
        self.b_face_normals[face_id]
    }

    fn b_face_cell(&self, face_id: usize) -> usize {
        self.b_face_cells[face_id]
    }

    fn locate_cell(&self, point: [f64; 3]) -> Option<usize> {
        match &self.grid {
            Some(grid) => Self::locate_in_grid(grid, point),
            None => self.nearest_cell(point),
        }
    }
}

/// Carrier fluid fields seen by injected particles.
pub trait FluidState {
    /// Number of stored time levels of the velocity field.
    fn n_time_levels(&self) -> usize {
        1
    }

    /// Fluid velocity in a cell at a time level.
    fn velocity(&self, cell_id: usize, level: usize) -> [f64; 3];

    /// Fluid temperature in a cell (Kelvin).
    fn temperature(&self, cell_id: usize) -> f64;
}

/// Uniform fluid at rest or in bulk motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFluid {
    pub velocity: [f64; 3],
    pub temperature: f64,
}

impl Default for UniformFluid {
    fn default() -> Self {
        Self {
            velocity: [0.0; 3],
            temperature: 293.15,
        }
    }
}

impl FluidState for UniformFluid {
    fn velocity(&self, _cell_id: usize, _level: usize) -> [f64; 3] {
        self.velocity
    }

    fn temperature(&self, _cell_id: usize) -> f64 {
        self.temperature
    }
}
