use glam::{Mat4, Vec2, Vec3, Vec4};
use prism_scene::{ColorSpace, ImageData, Material, MeshData, Side};
use std::path::Path;

use crate::AssetError;
use crate::environment::file_name;
use crate::id::AssetId;

/// One drawable piece of a model, already flattened into model space.
#[derive(Debug, Clone)]
pub struct ModelPrimitive {
    pub name: String,
    pub mesh: MeshData,
    /// Material without texture handles; see `texture`.
    pub material: Material,
    /// Node transform accumulated from the glTF scene root.
    pub transform: Mat4,
    /// Index into [`ModelAsset::textures`] for the base color map.
    pub texture: Option<usize>,
}

/// A decoded glTF model.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub id: AssetId,
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
    pub textures: Vec<ImageData>,
}

impl ModelAsset {
    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.mesh.triangle_count()).sum()
    }
}

/// Decode a `.gltf` or `.glb` file with all its buffers and images.
pub fn decode_model(path: impl AsRef<Path>) -> Result<ModelAsset, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let id = AssetId::from_bytes(&bytes);
    let (document, buffers, images) = gltf::import(path)?;

    let textures = images.iter().map(convert_image).collect::<Result<Vec<_>, _>>()?;

    let mut primitives = Vec::new();
    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            collect_node(&node, &buffers, Mat4::IDENTITY, &mut primitives)?;
        }
    }

    let name = file_name(path);
    if primitives.is_empty() {
        return Err(AssetError::EmptyModel(name));
    }
    tracing::debug!(
        path = %path.display(),
        %id,
        primitives = primitives.len(),
        textures = textures.len(),
        "decoded model"
    );

    Ok(ModelAsset {
        id,
        name,
        primitives,
        textures,
    })
}

fn collect_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent: Mat4,
    out: &mut Vec<ModelPrimitive>,
) -> Result<(), AssetError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("mesh").to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                tracing::warn!(mesh = %mesh_name, mode = ?primitive.mode(), "skipping non-triangle primitive");
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(positions) = reader.read_positions() else {
                tracing::warn!(mesh = %mesh_name, "skipping primitive without positions");
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from_array).collect();
            let count = positions.len();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..count as u32).collect(),
            };
            let uvs: Vec<Vec2> = match reader.read_tex_coords(0) {
                Some(uvs) => uvs.into_f32().map(Vec2::from_array).collect(),
                None => vec![Vec2::ZERO; count],
            };

            let mut data = MeshData {
                positions,
                normals: Vec::new(),
                uvs,
                indices,
            };
            match reader.read_normals() {
                Some(normals) => data.normals = normals.map(Vec3::from_array).collect(),
                None => data.compute_normals(),
            }
            data.validate()?;

            let (material, texture) = convert_material(&primitive.material());
            out.push(ModelPrimitive {
                name: mesh_name.clone(),
                mesh: data,
                material,
                transform: world,
                texture,
            });
        }
    }

    for child in node.children() {
        collect_node(&child, buffers, world, out)?;
    }
    Ok(())
}

fn convert_material(material: &gltf::Material) -> (Material, Option<usize>) {
    let pbr = material.pbr_metallic_roughness();
    let texture = pbr
        .base_color_texture()
        .map(|info| info.texture().source().index());
    let side = if material.double_sided() {
        Side::Double
    } else {
        Side::Front
    };
    (
        Material {
            base_color: Vec4::from_array(pbr.base_color_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            side,
            ..Material::default()
        },
        texture,
    )
}

fn convert_image(image: &gltf::image::Data) -> Result<ImageData, AssetError> {
    use gltf::image::Format;

    let pixels = match &image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            tracing::warn!(format = ?other, "unsupported texture format, using white");
            vec![255; (image.width * image.height * 4) as usize]
        }
    };
    Ok(ImageData::rgba8(
        image.width,
        image.height,
        ColorSpace::Srgb,
        pixels,
    )?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Write a one-triangle glTF with an external buffer into `dir`.
    pub(crate) fn write_triangle(dir: &Path) -> PathBuf {
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        std::fs::write(dir.join("tri.bin"), &bin).unwrap();

        let json = r#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "root", "translation": [0, 1, 0], "children": [1] },
                      { "name": "tri", "mesh": 0, "scale": [2, 2, 2] }],
            "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] }],
            "materials": [{ "doubleSided": true,
                            "pbrMetallicRoughness": { "baseColorFactor": [1, 0.5, 0.25, 1], "metallicFactor": 0.5 } }],
            "buffers": [{ "uri": "tri.bin", "byteLength": 44 }],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }],
            "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                            "min": [0, 0, 0], "max": [1, 1, 0] },
                          { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }]
        }"#;
        let path = dir.join("tri.gltf");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn decodes_triangle_with_node_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let model = decode_model(write_triangle(dir.path())).unwrap();

        assert_eq!(model.name, "tri.gltf");
        assert_eq!(model.primitives.len(), 1);
        assert_eq!(model.triangle_count(), 1);
        assert!(model.textures.is_empty());

        let prim = &model.primitives[0];
        assert_eq!(prim.mesh.indices, vec![0, 1, 2]);
        // Normals were computed from counter-clockwise winding.
        assert!((prim.mesh.normals[0] - Vec3::Z).length() < 1e-6);
        assert_eq!(prim.mesh.uvs, vec![Vec2::ZERO; 3]);
        let p = prim.transform.transform_point3(Vec3::X);
        assert!((p - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);

        assert_eq!(prim.material.base_color, Vec4::new(1.0, 0.5, 0.25, 1.0));
        assert_eq!(prim.material.metallic, 0.5);
        assert_eq!(prim.material.side, Side::Double);
        assert_eq!(prim.texture, None);
    }

    #[test]
    fn model_without_meshes_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gltf");
        std::fs::write(
            &path,
            r#"{ "asset": { "version": "2.0" }, "scenes": [{ "nodes": [0] }], "nodes": [{ "name": "lonely" }] }"#,
        )
        .unwrap();
        assert!(matches!(
            decode_model(&path).unwrap_err(),
            AssetError::EmptyModel(name) if name == "empty.gltf"
        ));
    }

    #[test]
    fn malformed_gltf_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(decode_model(&path).unwrap_err(), AssetError::Gltf(_)));
    }

    #[test]
    fn rgb_textures_gain_alpha() {
        let data = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let image = convert_image(&data).unwrap();
        assert_eq!(
            image.pixels,
            prism_scene::ImagePixels::Rgba8(vec![10, 20, 30, 255, 40, 50, 60, 255])
        );
    }
}
