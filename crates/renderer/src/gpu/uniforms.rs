//! std140 layout and packing for the composed program's uniform block.
//!
//! Loose `uniform` statements are gathered into one block at `set = 0,
//! binding = 0`. The layout follows GLSL std140: vec3 aligns like vec4, array
//! elements and matrix columns are padded to 16 bytes, and the block size is a
//! multiple of 16. Bools travel as `int`.

use chunks::{GlslType, UniformDeclaration, UniformTable, UniformValue};

use crate::error::CompileLinkError;

/// Prefix of the `int` member that carries a bool uniform. The bool itself is
/// a private global of the same name, loaded at the top of `main`.
const FLAG_PREFIX: &str = "vjshade_";

const STD140_ARRAY_ALIGN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformSlot {
    pub name: String,
    pub ty: GlslType,
    pub array_len: Option<u32>,
    pub offset: usize,
    /// Distance between array elements; equals the element size for non-arrays.
    pub stride: usize,
}

impl UniformSlot {
    pub fn is_flag(&self) -> bool {
        self.ty == GlslType::Bool
    }

    /// Block members keep the declared name, except bools.
    pub fn member_name(&self) -> String {
        if self.is_flag() {
            format!("{FLAG_PREFIX}{}", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Member declaration inside the block.
    pub fn member_declaration(&self) -> String {
        let keyword = match self.ty {
            GlslType::Bool => "int",
            ref other => other.keyword(),
        };
        match self.array_len {
            Some(len) => format!("{keyword} {}[{len}];", self.member_name()),
            None => format!("{keyword} {};", self.member_name()),
        }
    }

    fn element_count(&self) -> usize {
        self.array_len.map(|len| len as usize).unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: usize,
}

/// (alignment, size) of a single element.
fn std140_element(ty: &GlslType) -> Option<(usize, usize)> {
    let layout = match ty {
        GlslType::Bool | GlslType::Int | GlslType::Float => (4, 4),
        GlslType::Vec2 | GlslType::IVec2 => (8, 8),
        GlslType::Vec3 | GlslType::IVec3 => (16, 12),
        GlslType::Vec4 | GlslType::IVec4 => (16, 16),
        GlslType::Mat2 => (16, 32),
        GlslType::Mat3 => (16, 48),
        GlslType::Mat4 => (16, 64),
        GlslType::Sampler2D | GlslType::Unsupported(_) => return None,
    };
    Some(layout)
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

impl UniformLayout {
    /// Lays out every non-sampler declaration in order.
    pub fn from_declarations(declarations: &[UniformDeclaration]) -> Result<Self, CompileLinkError> {
        let mut slots = Vec::new();
        let mut cursor = 0usize;
        for decl in declarations.iter().filter(|decl| !decl.ty.is_sampler()) {
            let (align, size) = std140_element(&decl.ty).ok_or_else(|| {
                CompileLinkError::unsupported(format!(
                    "uniform `{}` has unsupported type `{}`",
                    decl.name, decl.ty
                ))
            })?;
            if decl.ty == GlslType::Bool && decl.array_len.is_some() {
                return Err(CompileLinkError::unsupported(format!(
                    "bool array uniform `{}` is not supported",
                    decl.name
                )));
            }
            let (align, stride, total) = match decl.array_len {
                Some(0) => {
                    return Err(CompileLinkError::unsupported(format!(
                        "uniform array `{}` has zero length",
                        decl.name
                    )))
                }
                Some(len) => {
                    let stride = round_up(size, STD140_ARRAY_ALIGN);
                    (STD140_ARRAY_ALIGN, stride, stride * len as usize)
                }
                None => (align, size, size),
            };
            let offset = round_up(cursor, align);
            slots.push(UniformSlot {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                array_len: decl.array_len,
                offset,
                stride,
            });
            cursor = offset + total;
        }
        let size = round_up(cursor, 16).max(16);
        Ok(Self { slots, size })
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Block size in bytes; at least 16.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Writes the table into `out` (resized to [`UniformLayout::size`]).
    ///
    /// Missing values stay zero. Returns the names whose stored value could
    /// not be coerced to the declared type; whatever fits is still written.
    pub fn pack(&self, table: &UniformTable, out: &mut Vec<u8>) -> Vec<String> {
        out.clear();
        out.resize(self.size, 0);
        let mut mismatched = Vec::new();
        for slot in &self.slots {
            let Some(value) = table.get(&slot.name) else {
                continue;
            };
            if matches!(value, UniformValue::Texture(_)) {
                mismatched.push(slot.name.clone());
                continue;
            }
            let components = value.components();
            let per_element = slot.ty.components();
            let expected = per_element * slot.element_count();
            if components.len() != expected {
                mismatched.push(slot.name.clone());
            }
            for (element, chunk) in components
                .chunks(per_element)
                .take(slot.element_count())
                .enumerate()
            {
                write_element(out, slot.offset + element * slot.stride, &slot.ty, chunk);
            }
        }
        mismatched
    }
}

fn put_f32(out: &mut [u8], offset: usize, value: f32) {
    out[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&value));
}

fn put_i32(out: &mut [u8], offset: usize, value: i32) {
    out[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&value));
}

fn write_element(out: &mut [u8], offset: usize, ty: &GlslType, components: &[f32]) {
    match ty {
        GlslType::Bool => {
            let flag = components.first().is_some_and(|value| *value != 0.0);
            put_i32(out, offset, i32::from(flag));
        }
        GlslType::Int | GlslType::IVec2 | GlslType::IVec3 | GlslType::IVec4 => {
            for (index, value) in components.iter().enumerate() {
                put_i32(out, offset + index * 4, *value as i32);
            }
        }
        GlslType::Float | GlslType::Vec2 | GlslType::Vec3 | GlslType::Vec4 => {
            for (index, value) in components.iter().enumerate() {
                put_f32(out, offset + index * 4, *value);
            }
        }
        GlslType::Mat2 | GlslType::Mat3 | GlslType::Mat4 => {
            let columns = match ty {
                GlslType::Mat2 => 2,
                GlslType::Mat3 => 3,
                _ => 4,
            };
            for (index, value) in components.iter().enumerate() {
                let (column, row) = (index / columns, index % columns);
                put_f32(out, offset + column * 16 + row * 4, *value);
            }
        }
        GlslType::Sampler2D | GlslType::Unsupported(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunks::parse_declarations;

    fn layout(text: &str) -> UniformLayout {
        UniformLayout::from_declarations(&parse_declarations(text)).unwrap()
    }

    fn offsets(layout: &UniformLayout) -> Vec<usize> {
        layout.slots().iter().map(|slot| slot.offset).collect()
    }

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    fn i32_at(bytes: &[u8], offset: usize) -> i32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    #[test]
    fn vec3_aligns_to_sixteen_and_scalars_fill_the_gap() {
        let layout = layout("uniform float a; uniform vec3 b; uniform float c; uniform vec2 d;");
        assert_eq!(offsets(&layout), vec![0, 16, 28, 32]);
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn arrays_and_matrices_use_sixteen_byte_strides() {
        let layout = layout("uniform float weights[3]; uniform mat3 m; uniform int n;");
        assert_eq!(offsets(&layout), vec![0, 48, 96]);
        assert_eq!(layout.slots()[0].stride, 16);
        assert_eq!(layout.size(), 112);
    }

    #[test]
    fn samplers_are_not_block_members() {
        let layout = layout("uniform sampler2D u_image;");
        assert!(layout.is_empty());
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = UniformLayout::from_declarations(&parse_declarations("uniform samplerCube sky;"))
            .unwrap_err();
        assert_eq!(err.stage, crate::error::CompileStage::Unsupported);
    }

    #[test]
    fn packs_values_with_coercion() {
        let layout = layout("uniform int count; uniform bool on; uniform vec3 tint; uniform float weights[2];");
        let mut table = UniformTable::new();
        table.set("count", 3.0f32);
        table.set("on", true);
        table.set("tint", [0.25f32, 0.5, 0.75]);
        table.set("weights", UniformValue::Floats(vec![1.0, 2.0]));

        let mut bytes = Vec::new();
        let mismatched = layout.pack(&table, &mut bytes);
        assert!(mismatched.is_empty());
        assert_eq!(i32_at(&bytes, 0), 3);
        assert_eq!(i32_at(&bytes, 4), 1);
        assert_eq!(f32_at(&bytes, 16), 0.25);
        assert_eq!(f32_at(&bytes, 24), 0.75);
        assert_eq!(f32_at(&bytes, 32), 1.0);
        assert_eq!(f32_at(&bytes, 48), 2.0);
    }

    #[test]
    fn missing_values_stay_zero_and_wrong_shapes_are_reported() {
        let layout = layout("uniform vec4 colour; uniform float speed;");
        let mut table = UniformTable::new();
        table.set("colour", [1.0f32, 1.0]);

        let mut bytes = vec![0xff; 3];
        let mismatched = layout.pack(&table, &mut bytes);
        assert_eq!(mismatched, vec!["colour".to_string()]);
        assert_eq!(bytes.len(), 32);
        assert_eq!(f32_at(&bytes, 4), 1.0);
        assert_eq!(f32_at(&bytes, 8), 0.0);
        assert_eq!(f32_at(&bytes, 16), 0.0);
    }

    #[test]
    fn matrices_pad_each_column() {
        let layout = layout("uniform mat3 m;");
        let mut table = UniformTable::new();
        table.set(
            "m",
            UniformValue::Mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
        );
        let mut bytes = Vec::new();
        assert!(layout.pack(&table, &mut bytes).is_empty());
        assert_eq!(f32_at(&bytes, 0), 1.0);
        assert_eq!(f32_at(&bytes, 16), 4.0);
        assert_eq!(f32_at(&bytes, 40), 9.0);
    }

    #[test]
    fn members_keep_their_names_except_bools() {
        let layout = layout("uniform bool flag; uniform vec2 offset; uniform float weights[2];");
        let declarations: Vec<String> = layout
            .slots()
            .iter()
            .map(UniformSlot::member_declaration)
            .collect();
        assert_eq!(
            declarations,
            vec!["int vjshade_flag;", "vec2 offset;", "float weights[2];"]
        );
        assert!(layout.slots()[0].is_flag());
        assert!(!layout.slots()[1].is_flag());
    }
}
