//! Terrain mesh generation with LOD decimation and seam-free borders.
//!
//! The input grid is `num_verts_per_line` samples on a side and holds
//! three structurally different vertex classes:
//!
//! - The outermost ring ("out-of-mesh" vertices) exists only so border
//!   normals can account for the neighboring chunk's slope. These carry
//!   negative indices during construction and never reach the final
//!   index buffer.
//! - The second-from-edge ring contains "edge connection" vertices: kept
//!   at full grid resolution at every LOD, but with their height
//!   linearly interpolated between the two nearest decimated main
//!   vertices along that edge. This is what lets a chunk rendered at
//!   LOD 2 butt against a LOD 0 neighbor without a gap.
//! - Everything further in is decimated by the LOD skip increment.

use glam::{Vec2, Vec3};

use crate::terrain::grid::FloatGrid;
use crate::terrain::settings::MeshSettings;

/// Decimation stride for a LOD index.
pub fn skip_increment(lod: usize) -> usize {
    if lod == 0 { 1 } else { lod * 2 }
}

/// Finalized renderable geometry. Ownership transfers to the renderer
/// collaborator once built; nothing here is mutated afterwards.
pub struct MeshData {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    normals: Vec<Vec3>,

    // Scaffolding for border normals, discarded at finalization.
    out_of_mesh_vertices: Vec<Vec3>,
    out_of_mesh_triangles: Vec<i32>,

    flat_shading: bool,
}

impl MeshData {
    fn new(flat_shading: bool) -> Self {
        MeshData {
            vertices: Vec::new(),
            uvs: Vec::new(),
            triangles: Vec::new(),
            normals: Vec::new(),
            out_of_mesh_vertices: Vec::new(),
            out_of_mesh_triangles: Vec::new(),
            flat_shading,
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, vertex_index: i32) {
        if vertex_index >= 0 {
            debug_assert_eq!(vertex_index as usize, self.vertices.len());
            self.vertices.push(position);
            self.uvs.push(uv);
        } else {
            debug_assert_eq!((-vertex_index - 1) as usize, self.out_of_mesh_vertices.len());
            self.out_of_mesh_vertices.push(position);
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.out_of_mesh_triangles.extend_from_slice(&[a, b, c]);
        } else {
            self.triangles
                .extend_from_slice(&[a as u32, b as u32, c as u32]);
        }
    }

    fn vertex_at(&self, index: i32) -> Vec3 {
        if index >= 0 {
            self.vertices[index as usize]
        } else {
            self.out_of_mesh_vertices[(-index - 1) as usize]
        }
    }

    fn surface_normal(&self, a: i32, b: i32, c: i32) -> Vec3 {
        let point_a = self.vertex_at(a);
        let ab = self.vertex_at(b) - point_a;
        let ac = self.vertex_at(c) - point_a;
        ab.cross(ac).normalize_or_zero()
    }

    /// Accumulate face normals at every vertex, including contributions
    /// from out-of-mesh triangles so border normals match the neighboring
    /// chunk, then normalize. Out-of-mesh vertices themselves get no
    /// normal; they are not part of the output.
    fn bake_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for triangle in self.triangles.chunks_exact(3) {
            let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
            let normal = self.surface_normal(a as i32, b as i32, c as i32);
            normals[a as usize] += normal;
            normals[b as usize] += normal;
            normals[c as usize] += normal;
        }

        for triangle in self.out_of_mesh_triangles.chunks_exact(3) {
            let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
            let normal = self.surface_normal(a, b, c);
            for index in [a, b, c] {
                if index >= 0 {
                    normals[index as usize] += normal;
                }
            }
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }
        self.normals = normals;
    }

    /// Duplicate every vertex per triangle reference so each face shades
    /// flat. The index buffer becomes the identity sequence and normals
    /// are per-face.
    fn apply_flat_shading(&mut self) {
        let mut flat_vertices = Vec::with_capacity(self.triangles.len());
        let mut flat_uvs = Vec::with_capacity(self.triangles.len());
        for &index in &self.triangles {
            flat_vertices.push(self.vertices[index as usize]);
            flat_uvs.push(self.uvs[index as usize]);
        }

        let mut normals = Vec::with_capacity(flat_vertices.len());
        for face in flat_vertices.chunks_exact(3) {
            let normal = (face[1] - face[0]).cross(face[2] - face[0]).normalize_or_zero();
            normals.extend_from_slice(&[normal, normal, normal]);
        }

        self.vertices = flat_vertices;
        self.uvs = flat_uvs;
        self.normals = normals;
        self.triangles = (0..self.vertices.len() as u32).collect();
    }

    fn finalize(&mut self) {
        if self.flat_shading {
            self.apply_flat_shading();
        } else {
            self.bake_normals();
        }
        self.out_of_mesh_vertices = Vec::new();
        self.out_of_mesh_triangles = Vec::new();
    }
}

/// Build the mesh for one chunk at the given LOD.
///
/// `values` must be a square grid of `settings.num_verts_per_line()`
/// final heights; settings are assumed pre-validated.
pub fn build_terrain_mesh(values: &FloatGrid, settings: &MeshSettings, lod: usize) -> MeshData {
    let skip = skip_increment(lod) as i32;
    let num_verts_per_line = settings.num_verts_per_line() as i32;
    debug_assert_eq!(values.width(), num_verts_per_line as usize);
    debug_assert_eq!(values.height(), num_verts_per_line as usize);

    let mesh_world_size = settings.mesh_world_size();
    let top_left = Vec2::new(-1.0, 1.0) * mesh_world_size / 2.0;

    let mut mesh = MeshData::new(settings.use_flat_shading);

    let n = num_verts_per_line;
    let mut vertex_index_map = vec![0i32; (n * n) as usize];
    let mut mesh_vertex_index = 0;
    let mut out_of_mesh_vertex_index = -1;

    let is_skipped = |x: i32, y: i32| {
        x > 2 && x < n - 3 && y > 2 && y < n - 3 && ((x - 2) % skip != 0 || (y - 2) % skip != 0)
    };

    for y in 0..n {
        for x in 0..n {
            let is_out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            if is_out_of_mesh {
                vertex_index_map[(y * n + x) as usize] = out_of_mesh_vertex_index;
                out_of_mesh_vertex_index -= 1;
            } else if !is_skipped(x, y) {
                vertex_index_map[(y * n + x) as usize] = mesh_vertex_index;
                mesh_vertex_index += 1;
            }
        }
    }

    for y in 0..n {
        for x in 0..n {
            if is_skipped(x, y) {
                continue;
            }
            let is_out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            let is_mesh_edge = (y == 1 || y == n - 2 || x == 1 || x == n - 2) && !is_out_of_mesh;
            let is_main = (x - 2) % skip == 0
                && (y - 2) % skip == 0
                && !is_out_of_mesh
                && !is_mesh_edge;
            let is_edge_connection =
                (y == 2 || y == n - 3 || x == 2 || x == n - 3) && !is_out_of_mesh && !is_mesh_edge && !is_main;

            let vertex_index = vertex_index_map[(y * n + x) as usize];
            let percent = Vec2::new((x - 1) as f32, (y - 1) as f32) / (n - 3) as f32;
            let vertex_position_2d =
                top_left + Vec2::new(percent.x, -percent.y) * mesh_world_size;

            let mut height = values.get(x as usize, y as usize);
            if is_edge_connection {
                // Interpolate between the two nearest main vertices at
                // this LOD's resolution so this edge lines up with a
                // neighbor rendered at any other LOD.
                let is_vertical = x == 2 || x == n - 3;
                let dst_to_main_a = (if is_vertical { y - 2 } else { x - 2 }) % skip;
                let dst_to_main_b = skip - dst_to_main_a;
                let dst_percent = dst_to_main_a as f32 / skip as f32;

                let (ax, ay) = if is_vertical { (x, y - dst_to_main_a) } else { (x - dst_to_main_a, y) };
                let (bx, by) = if is_vertical { (x, y + dst_to_main_b) } else { (x + dst_to_main_b, y) };
                let height_a = values.get(ax as usize, ay as usize);
                let height_b = values.get(bx as usize, by as usize);
                height = height_a * (1.0 - dst_percent) + height_b * dst_percent;
            }

            mesh.add_vertex(
                Vec3::new(vertex_position_2d.x, height, vertex_position_2d.y),
                percent,
                vertex_index,
            );

            let creates_triangle =
                x < n - 1 && y < n - 1 && (!is_edge_connection || (x != 2 && y != 2));
            if creates_triangle {
                let current_increment = if is_main && x != n - 3 && y != n - 3 { skip } else { 1 };

                let a = vertex_index_map[(y * n + x) as usize];
                let b = vertex_index_map[(y * n + x + current_increment) as usize];
                let c = vertex_index_map[((y + current_increment) * n + x) as usize];
                let d = vertex_index_map[((y + current_increment) * n + x + current_increment) as usize];
                // Two triangles per quad, same diagonal throughout, so
                // winding stays consistent and normals do not flip.
                mesh.add_triangle(a, d, c);
                mesh.add_triangle(d, a, b);
            }
        }
    }

    mesh.finalize();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_settings(flat: bool) -> MeshSettings {
        MeshSettings {
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
            mesh_scale: 2.0,
            use_flat_shading: flat,
        }
    }

    fn grid_from(settings: &MeshSettings, f: impl Fn(i32, i32) -> f32) -> FloatGrid {
        let n = settings.num_verts_per_line();
        FloatGrid::from_fn(n, n, |x, y| f(x as i32, y as i32))
    }

    #[test]
    fn test_smooth_vertex_count_is_interior_grid_count() {
        let settings = mesh_settings(false);
        let n = settings.num_verts_per_line();
        let grid = grid_from(&settings, |_, _| 0.0);
        let mesh = build_terrain_mesh(&grid, &settings, 0);
        assert_eq!(mesh.vertices().len(), (n - 2) * (n - 2));
        assert_eq!(mesh.normals().len(), mesh.vertices().len());
        assert_eq!(mesh.uvs().len(), mesh.vertices().len());
    }

    #[test]
    fn test_higher_lod_produces_fewer_vertices() {
        let settings = mesh_settings(false);
        let grid = grid_from(&settings, |x, y| (x + y) as f32);
        let full = build_terrain_mesh(&grid, &settings, 0);
        let coarse = build_terrain_mesh(&grid, &settings, 2);
        assert!(coarse.vertices().len() < full.vertices().len());
        assert!(coarse.triangle_count() < full.triangle_count());
    }

    #[test]
    fn test_flat_shaded_vertex_count_is_three_per_triangle() {
        let settings = mesh_settings(true);
        let grid = grid_from(&settings, |x, y| (x * y) as f32 * 0.01);
        let mesh = build_terrain_mesh(&grid, &settings, 1);
        assert_eq!(mesh.vertices().len(), 3 * mesh.triangle_count());
        // Identity index buffer after duplication.
        for (i, &index) in mesh.indices().iter().enumerate() {
            assert_eq!(index as usize, i);
        }
    }

    #[test]
    fn test_indices_reference_valid_vertices() {
        let settings = mesh_settings(false);
        let grid = grid_from(&settings, |x, y| ((x * 31 + y * 17) % 7) as f32);
        for lod in 0..5 {
            let mesh = build_terrain_mesh(&grid, &settings, lod);
            for &index in mesh.indices() {
                assert!((index as usize) < mesh.vertices().len());
            }
        }
    }

    #[test]
    fn test_flat_grid_has_up_normals_everywhere() {
        let settings = mesh_settings(false);
        let grid = grid_from(&settings, |_, _| 3.0);
        let mesh = build_terrain_mesh(&grid, &settings, 0);
        for normal in mesh.normals() {
            assert!((*normal - Vec3::Y).length() < 1e-5, "normal {normal:?}");
        }
    }

    #[test]
    fn test_edge_connection_heights_interpolate_exactly_on_ramp() {
        // On a linear ramp, interpolating between decimated neighbors
        // reproduces the original height, so every vertex must sit on the
        // ramp even at a coarse LOD.
        let settings = mesh_settings(false);
        let grid = grid_from(&settings, |x, _| x as f32 * 0.5);
        let mesh = build_terrain_mesh(&grid, &settings, 2);
        let n = settings.num_verts_per_line() as f32;
        let world = settings.mesh_world_size();
        for vertex in mesh.vertices() {
            // Invert the vertex position back to grid x.
            let percent = (vertex.x + world / 2.0) / world;
            let grid_x = percent * (n - 3.0) + 1.0;
            let expected = grid_x * 0.5;
            assert!(
                (vertex.y - expected).abs() < 1e-4,
                "vertex off ramp: {vertex:?}, expected height {expected}"
            );
        }
    }

    // Two adjacent chunks share a column of heights; rendered at LOD 0
    // and LOD 2 respectively, the vertices on the shared edge must land
    // on identical world positions: the mesh-edge ring is never
    // decimated and the connection ring absorbs the LOD difference.
    #[test]
    fn test_adjacent_lods_stitch_without_gap() {
        let settings = mesh_settings(false);
        let n = settings.num_verts_per_line() as i32;
        let world = settings.mesh_world_size();
        // Chunk B sits one chunk to the +x; grid column x in B samples the
        // same world column as x + (n - 3) in A's frame.
        let base = |x: i32, y: i32| ((x * 13 + y * 7) % 29) as f32;
        let grid_a = grid_from(&settings, base);
        let grid_b = grid_from(&settings, |x, y| base(x + n - 3, y));

        let mesh_a = build_terrain_mesh(&grid_a, &settings, 0);
        let mesh_b = build_terrain_mesh(&grid_b, &settings, 2);

        let half = world / 2.0;
        let edge_a: Vec<Vec3> = mesh_a
            .vertices()
            .iter()
            .copied()
            .filter(|v| v.x == half)
            .collect();
        let edge_b: Vec<Vec3> = mesh_b
            .vertices()
            .iter()
            .copied()
            // Shift B into A's frame before comparing.
            .map(|v| Vec3::new(v.x + world, v.y, v.z))
            .filter(|v| v.x == half)
            .collect();

        // Full-resolution edge ring: one vertex per interior row.
        assert_eq!(edge_a.len(), (n - 2) as usize);
        assert_eq!(edge_a.len(), edge_b.len());
        for vertex_b in &edge_b {
            let matched = edge_a
                .iter()
                .any(|vertex_a| vertex_a.z == vertex_b.z && vertex_a.y == vertex_b.y);
            assert!(matched, "no exact counterpart for edge vertex {vertex_b:?}");
        }
    }

    #[test]
    fn test_consistent_winding_on_sloped_grid() {
        // All face normals of a gentle slope should point upward; a
        // flipped diagonal would produce a downward face.
        let settings = mesh_settings(false);
        let grid = grid_from(&settings, |x, y| (x + y) as f32 * 0.1);
        let mesh = build_terrain_mesh(&grid, &settings, 1);
        for triangle in mesh.indices().chunks_exact(3) {
            let a = mesh.vertices()[triangle[0] as usize];
            let b = mesh.vertices()[triangle[1] as usize];
            let c = mesh.vertices()[triangle[2] as usize];
            let normal = (b - a).cross(c - a);
            assert!(normal.y > 0.0, "face normal points down: {normal:?}");
        }
    }
}
