//! ASAP annotation document writer
//!
//! Builds and renders the `ASAP_Annotations` XML dialect: an `Annotations`
//! list of Polygon/Dot/Rectangle elements and an `AnnotationGroups` list of
//! per-classification containers. Group order and the annotation naming
//! scheme follow the format ASAP expects; names must stay unique within a
//! document or the viewer collapses them.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::annotation::AnnotationObject;
use crate::error::ConvertError;
use crate::offset::ResolvedOffset;

/// Classification vocabulary in emission order, with display colors.
/// The hotspot group only exists for the hotspot-offset strategy.
pub const CLASSIFICATION_GROUPS: [(&str, &str); 4] = [
    ("Tumor", "#4d66cc"),
    ("Extraepithelial CD8+ Cell", "magenta"),
    ("Intraepithelial CD8+ Cell", "magenta"),
    ("Center of Mass", "black"),
];

pub const HOTSPOT_GROUP: (&str, &str) = ("hotspot", "#64FE2E");

const CENTER_OF_MASS: &str = "Center of Mass";
const HOTSPOT: &str = "hotspot";

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Polygon(Vec<(f64, f64)>),
    Dot((f64, f64)),
    Rectangle(Vec<(f64, f64)>),
}

impl Shape {
    fn type_name(&self) -> &'static str {
        match self {
            Shape::Polygon(_) => "Polygon",
            Shape::Dot(_) => "Dot",
            Shape::Rectangle(_) => "Rectangle",
        }
    }

    fn points(&self) -> &[(f64, f64)] {
        match self {
            Shape::Polygon(points) | Shape::Rectangle(points) => points,
            Shape::Dot(point) => std::slice::from_ref(point),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Annotation {
    pub name: String,
    pub part_of_group: String,
    pub color: String,
    pub shape: Shape,
}

#[derive(Clone, Debug)]
pub struct Group {
    pub name: String,
    pub color: String,
}

/// An ASAP document under construction.
#[derive(Clone, Debug, Default)]
pub struct AsapDocument {
    pub annotations: Vec<Annotation>,
    pub groups: Vec<Group>,
}

impl AsapDocument {
    /// Append one tile's worth of annotations.
    ///
    /// Every group of the vocabulary is added (even when it stays empty),
    /// optionally suffixed to keep per-tile groups distinct in an aggregate
    /// document. Names follow the reference scheme relative to `name_base`:
    /// `Annotation <base + i>` for the shape of object `i`,
    /// `Annotation <base + i + n>` for its center-of-mass dot, and
    /// `Annotation <base + 2n>` for the hotspot rectangle. Returns the name
    /// base for the next tile.
    pub fn append_tile(
        &mut self,
        objects: &[AnnotationObject],
        resolved: &ResolvedOffset,
        group_suffix: Option<&str>,
        name_base: usize,
    ) -> usize {
        let suffixed = |name: &str| match group_suffix {
            Some(suffix) => format!("{}{}", name, suffix),
            None => name.to_string(),
        };
        let count = objects.len();
        let offset = resolved.offset;

        let mut groups: Vec<(&str, &str)> = CLASSIFICATION_GROUPS.to_vec();
        if resolved.hotspot_polygon.is_some() {
            groups.push(HOTSPOT_GROUP);
        }

        for (group, color) in groups {
            let group_name = suffixed(group);
            self.groups.push(Group {
                name: group_name.clone(),
                color: color.to_string(),
            });

            for (i, object) in objects.iter().enumerate() {
                if object.classification == group {
                    let points = object.roi_points.iter().map(|&p| offset.apply(p)).collect();
                    self.annotations.push(Annotation {
                        name: format!("Annotation {}", name_base + i),
                        part_of_group: group_name.clone(),
                        color: color.to_string(),
                        shape: Shape::Polygon(points),
                    });
                } else if group == CENTER_OF_MASS {
                    self.annotations.push(Annotation {
                        name: format!("Annotation {}", name_base + i + count),
                        part_of_group: group_name.clone(),
                        color: color.to_string(),
                        shape: Shape::Dot(offset.apply(object.center_of_mass)),
                    });
                }
            }

            if group == HOTSPOT {
                if let Some(polygon) = &resolved.hotspot_polygon {
                    // The hotspot rectangle is already in slide space; its
                    // first coordinate is the origin everything else was
                    // translated by.
                    self.annotations.push(Annotation {
                        name: format!("Annotation {}", name_base + 2 * count),
                        part_of_group: group_name.clone(),
                        color: color.to_string(),
                        shape: Shape::Rectangle(polygon.clone()),
                    });
                }
            }
        }

        let hotspot_emitted = resolved.hotspot_polygon.is_some() as usize;
        name_base + 2 * count + hotspot_emitted
    }

    /// Render the document as indented XML.
    pub fn render(&self) -> Result<String, ConvertError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Start(BytesStart::new("ASAP_Annotations")))?;
        writer.write_event(Event::Start(BytesStart::new("Annotations")))?;
        for annotation in &self.annotations {
            let mut el = BytesStart::new("Annotation");
            el.push_attribute(("Name", annotation.name.as_str()));
            el.push_attribute(("PartOfGroup", annotation.part_of_group.as_str()));
            el.push_attribute(("Color", annotation.color.as_str()));
            el.push_attribute(("Type", annotation.shape.type_name()));
            writer.write_event(Event::Start(el))?;

            writer.write_event(Event::Start(BytesStart::new("Coordinates")))?;
            for (order, (x, y)) in annotation.shape.points().iter().enumerate() {
                let mut coord = BytesStart::new("Coordinate");
                coord.push_attribute(("Order", order.to_string().as_str()));
                coord.push_attribute(("X", x.to_string().as_str()));
                coord.push_attribute(("Y", y.to_string().as_str()));
                writer.write_event(Event::Empty(coord))?;
            }
            writer.write_event(Event::End(BytesEnd::new("Coordinates")))?;
            writer.write_event(Event::End(BytesEnd::new("Annotation")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Annotations")))?;

        writer.write_event(Event::Start(BytesStart::new("AnnotationGroups")))?;
        for group in &self.groups {
            let mut el = BytesStart::new("Group");
            el.push_attribute(("Name", group.name.as_str()));
            el.push_attribute(("PartOfGroup", "None"));
            el.push_attribute(("Color", group.color.as_str()));
            writer.write_event(Event::Start(el))?;
            writer.write_event(Event::Empty(BytesStart::new("Attributes")))?;
            writer.write_event(Event::End(BytesEnd::new("Group")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("AnnotationGroups")))?;
        writer.write_event(Event::End(BytesEnd::new("ASAP_Annotations")))?;

        let bytes = writer.into_inner();
        Ok(String::from_utf8(bytes).expect("XML output is UTF-8"))
    }
}
