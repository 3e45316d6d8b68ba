//! Parser tests over inline capabilities fixtures for all three dialects.

use weave_capabilities::adviser::StaticAdviser;
use weave_capabilities::{parse_capabilities, CapabilitiesError};

const WMS_130: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms">
  <Service>
    <Name>WMS</Name>
    <Title>Demo Server</Title>
    <Abstract>A demo</Abstract>
    <KeywordList><Keyword>demo</Keyword><Keyword>wms</Keyword></KeywordList>
    <OnlineResource xlink:href="https://example.com/geoserver"/>
    <Fees>none</Fees>
    <AccessConstraints>none</AccessConstraints>
    <LayerLimit>16</LayerLimit>
    <MaxWidth>4096</MaxWidth>
    <MaxHeight>4096</MaxHeight>
  </Service>
  <Capability>
    <Request>
      <GetMap>
        <Format>image/png</Format>
        <Format>image/jpeg</Format>
        <DCPType><HTTP><Get><OnlineResource xlink:href="https://example.com/geoserver/wms?"/></Get></HTTP></DCPType>
      </GetMap>
      <GetFeatureInfo>
        <Format>text/html</Format>
        <DCPType><HTTP><Get><OnlineResource xlink:href="https://example.com/geoserver/wms?"/></Get></HTTP></DCPType>
      </GetFeatureInfo>
    </Request>
    <Exception><Format>XML</Format></Exception>
    <Layer>
      <Title>Root</Title>
      <CRS>EPSG:4326</CRS>
      <CRS>EPSG:3857</CRS>
      <EX_GeographicBoundingBox>
        <westBoundLongitude>-130</westBoundLongitude>
        <eastBoundLongitude>-60</eastBoundLongitude>
        <southBoundLatitude>20</southBoundLatitude>
        <northBoundLatitude>55</northBoundLatitude>
      </EX_GeographicBoundingBox>
      <BoundingBox CRS="EPSG:4326" minx="20" miny="-130" maxx="55" maxy="-60"/>
      <Style>
        <Name>basic</Name>
        <Title>Basic</Title>
        <LegendURL width="20" height="20">
          <Format>image/png</Format>
          <OnlineResource xlink:href="https://srv/legend?layer=parent&amp;style=basic"/>
        </LegendURL>
      </Style>
      <Layer queryable="1">
        <Name>child</Name>
        <Title>Child Layer</Title>
        <CRS>EPSG:4326</CRS>
        <Style>
          <Name>extra</Name>
          <Title>Extra</Title>
        </Style>
      </Layer>
      <Layer>
        <Name>other</Name>
        <Title>Other Layer</Title>
        <Style>
          <Name>basic</Name>
          <Title>Replaced Basic</Title>
        </Style>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

#[test]
fn test_wms_130_service_metadata() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();
    assert_eq!(model.version, "1.3.0");
    assert_eq!(model.service.title, "Demo Server");
    assert_eq!(model.service.keywords, vec!["demo", "wms"]);
    assert_eq!(model.service.layer_limit, 16);
    assert_eq!(model.service.max_width, 4096);
    assert_eq!(model.request.get_map.formats, vec!["image/png", "image/jpeg"]);
    assert_eq!(
        model.request.get_map.first_get_url(),
        Some("https://example.com/geoserver/wms?")
    );
    assert_eq!(model.exception_formats, vec!["XML"]);
}

#[test]
fn test_wms_130_layer_tree_and_order_ids() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();

    assert_eq!(model.wms_roots.len(), 1);
    let root = &model.wms_roots[0];
    assert_eq!(root.order_id, 1);
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].order_id, 2);
    assert_eq!(root.children[1].order_id, 3);

    // Flat list: named layers plus the unnamed root.
    let ids: Vec<u32> = model.wms_layers.iter().map(|l| l.order_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(model.layer_index.ancestors(2), vec![1]);
    assert_eq!(model.layer_queryable.get("child"), Some(&true));
    assert_eq!(model.layer_queryable.get("other"), Some(&false));
}

#[test]
fn test_wms_130_crs_inheritance_dedup() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();
    let child = model.wms_layer_by_title("Child Layer").unwrap();
    // Inherited EPSG:4326 + EPSG:3857; child re-declares 4326, no duplicate.
    assert_eq!(child.crs_ids, vec!["EPSG:4326", "EPSG:3857"]);
}

#[test]
fn test_wms_130_bbox_axis_inversion() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();
    let root = &model.wms_roots[0];
    // Declared lat-first (20,-130)-(55,-60); stored x=lon.
    let bbox = root.bounding_box_for("EPSG:4326").unwrap();
    assert_eq!(bbox.rect.min_x, -130.0);
    assert_eq!(bbox.rect.min_y, 20.0);
    assert_eq!(bbox.rect.max_x, -60.0);
    assert_eq!(bbox.rect.max_y, 55.0);
}

#[test]
fn test_wms_130_legend_url_rewritten_for_child() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();
    let child = model.wms_layer_by_title("Child Layer").unwrap();
    let inherited = child.styles.iter().find(|s| s.name == "basic").unwrap();
    assert_eq!(
        inherited.legend_urls[0].href,
        "https://srv/legend?layer=child&style=basic"
    );
    // The child's own style is present too.
    assert!(child.styles.iter().any(|s| s.name == "extra"));

    // The parent keeps the original target.
    let root = &model.wms_roots[0];
    assert_eq!(
        root.styles[0].legend_urls[0].href,
        "https://srv/legend?layer=parent&style=basic"
    );
}

#[test]
fn test_wms_130_style_replaces_inherited_same_name() {
    let model = parse_capabilities(WMS_130, &StaticAdviser::common()).unwrap();
    let other = model.wms_layer_by_title("Other Layer").unwrap();
    let basics: Vec<_> = other.styles.iter().filter(|s| s.name == "basic").collect();
    assert_eq!(basics.len(), 1);
    assert_eq!(basics[0].title, "Replaced Basic");
}

const WMS_111: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE WMT_MS_Capabilities SYSTEM "http://schemas.opengis.net/wms/1.1.1/capabilities_1_1_1.dtd">
<WMT_MS_Capabilities version="1.1.1">
  <Service><Name>OGC:WMS</Name><Title>Old Server</Title></Service>
  <Capability>
    <Request>
      <GetMap>
        <Format>image/png</Format>
        <DCPType><HTTP><Get><OnlineResource xlink:href="https://old.example.com/wms"/></Get></HTTP></DCPType>
      </GetMap>
    </Request>
    <Layer>
      <Name>topo</Name>
      <Title>Topo</Title>
      <SRS>EPSG:4326 EPSG:3857</SRS>
      <LatLonBoundingBox minx="5,5" miny="45" maxx="10,5" maxy="48"/>
      <BoundingBox SRS="EPSG:4326" minx="5.5" miny="45" maxx="10.5" maxy="48"/>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>"#;

#[test]
fn test_wms_111_dtd_and_multi_srs_and_commas() {
    let model = parse_capabilities(WMS_111, &StaticAdviser::common()).unwrap();
    assert_eq!(model.version, "1.1.1");

    let layer = model.wms_layer_by_title("Topo").unwrap();
    // One SRS element carrying two codes, split on whitespace.
    assert_eq!(layer.crs_ids, vec!["EPSG:4326", "EPSG:3857"]);

    // Comma decimal separators are tolerated.
    assert_eq!(layer.ex_geographic_bbox.min_x, 5.5);
    assert_eq!(layer.ex_geographic_bbox.max_x, 10.5);

    // 1.1.1 bounding boxes are never axis-swapped.
    let bbox = layer.bounding_box_for("EPSG:4326").unwrap();
    assert_eq!(bbox.rect.min_x, 5.5);
    assert_eq!(bbox.rect.min_y, 45.0);
}

const WMTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities version="1.0.0" xmlns="http://www.opengis.net/wmts/1.0"
    xmlns:ows="http://www.opengis.net/ows/1.1">
  <ows:ServiceIdentification>
    <ows:Title>Tile Server</ows:Title>
  </ows:ServiceIdentification>
  <ows:OperationsMetadata>
    <ows:Operation name="GetTile">
      <ows:DCP><ows:HTTP>
        <ows:Get xlink:href="https://example.com/wmts">
          <ows:Constraint name="GetEncoding">
            <ows:AllowedValues><ows:Value>kvp</ows:Value></ows:AllowedValues>
          </ows:Constraint>
        </ows:Get>
      </ows:HTTP></ows:DCP>
    </ows:Operation>
  </ows:OperationsMetadata>
  <Contents>
    <Layer>
      <ows:Identifier>img</ows:Identifier>
      <ows:Title>Imagery</ows:Title>
      <ows:WGS84BoundingBox>
        <ows:LowerCorner>-180 -85.05</ows:LowerCorner>
        <ows:UpperCorner>180 85.05</ows:UpperCorner>
      </ows:WGS84BoundingBox>
      <Style isDefault="true">
        <ows:Identifier>default</ows:Identifier>
        <LegendURL format="image/png" xlink:href="https://example.com/legend.png" width="16" height="16"/>
      </Style>
      <Format>image/png</Format>
      <Format>image/jpeg</Format>
      <Format>image/png</Format>
      <TileMatrixSetLink>
        <TileMatrixSet>GoogleMapsCompatible</TileMatrixSet>
        <TileMatrixSetLimits>
          <TileMatrixLimits>
            <TileMatrix>1</TileMatrix>
            <MinTileRow>0</MinTileRow><MaxTileRow>1</MaxTileRow>
            <MinTileCol>0</MinTileCol><MaxTileCol>1</MaxTileCol>
          </TileMatrixLimits>
          <TileMatrixLimits>
            <TileMatrix>1</TileMatrix>
            <MinTileRow>0</MinTileRow><MaxTileRow>7</MaxTileRow>
            <MinTileCol>0</MinTileCol><MaxTileCol>7</MaxTileCol>
          </TileMatrixLimits>
        </TileMatrixSetLimits>
      </TileMatrixSetLink>
      <ResourceURL format="image/png" resourceType="tile"
        template="https://t0.example.com/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png"/>
    </Layer>
    <Layer>
      <ows:Identifier>bare</ows:Identifier>
      <ows:Title>Bare</ows:Title>
      <TileMatrixSetLink><TileMatrixSet>GoogleMapsCompatible</TileMatrixSet></TileMatrixSetLink>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>GoogleMapsCompatible</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG:6.18:3:3857</ows:SupportedCRS>
      <TileMatrix>
        <ows:Identifier>0</ows:Identifier>
        <ScaleDenominator>559082264.029</ScaleDenominator>
        <TopLeftCorner>-20037508.343 20037508.343</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>1</MatrixWidth><MatrixHeight>1</MatrixHeight>
      </TileMatrix>
      <TileMatrix>
        <ows:Identifier>1</ows:Identifier>
        <ScaleDenominator>279541132.015</ScaleDenominator>
        <TopLeftCorner>-20037508.343 20037508.343</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>2</MatrixWidth><MatrixHeight>2</MatrixHeight>
      </TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

#[test]
fn test_wmts_matrix_set_resolution() {
    let model = parse_capabilities(WMTS, &StaticAdviser::common()).unwrap();
    let set = model.tile_matrix_sets.get("GoogleMapsCompatible").unwrap();
    // URN resolved to the canonical authority code.
    assert_eq!(set.crs_id, "EPSG:3857");
    assert_eq!(set.tile_matrices.len(), 2);

    // Ascending pixel size: level 1 (finer) first, level 0 last.
    assert_eq!(set.tile_matrices[0].identifier, "1");
    assert_eq!(set.coarsest().unwrap().identifier, "0");

    // pixelSize = scaleDenominator * 0.00028 / 1 m.
    let m0 = set.matrix_by_identifier("0").unwrap();
    assert!((m0.pixel_size - 559082264.029 * 0.00028).abs() < 1e-3);

    // Scale denominators decrease as pixel size increases in reverse.
    assert!(set.tile_matrices[0].scale_denominator < set.tile_matrices[1].scale_denominator);
}

#[test]
fn test_wmts_layer_formats_styles_limits() {
    let model = parse_capabilities(WMTS, &StaticAdviser::common()).unwrap();
    let layer = model.wmts_layer_by_title("Imagery").unwrap();

    // Unique formats, first-seen order.
    assert_eq!(layer.formats, vec!["image/png", "image/jpeg"]);

    // Default style with attribute-form legend URL.
    assert_eq!(layer.default_style, "default");
    let style = layer.styles.get("default").unwrap();
    assert!(style.is_default);
    assert_eq!(style.legend_urls[0].href, "https://example.com/legend.png");
    assert_eq!(style.legend_urls[0].width, 16);

    // The first limits entry fit the 2x2 matrix; the second (0..7) did not
    // and, keyed by the same matrix id, must not survive.
    let link = layer.matrix_set_links.get("GoogleMapsCompatible").unwrap();
    let limit = link.limits.get("1").unwrap();
    assert_eq!(limit.max_row, 1);
    assert_eq!(limit.max_col, 1);

    // REST template captured by format.
    assert_eq!(
        layer.get_tile_templates.get("image/png").unwrap(),
        "https://t0.example.com/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.png"
    );
}

#[test]
fn test_wmts_allowed_encodings_kvp_canonical() {
    let model = parse_capabilities(WMTS, &StaticAdviser::common()).unwrap();
    assert_eq!(model.request.get_tile.allowed_encodings, vec!["KVP"]);
    assert_eq!(
        model.request.get_tile.first_get_url(),
        Some("https://example.com/wmts")
    );
}

#[test]
fn test_wmts_bbox_fallback_from_matrix_set() {
    let model = parse_capabilities(WMTS, &StaticAdviser::common()).unwrap();
    let bare = model.wmts_layer_by_title("Bare").unwrap();
    assert_eq!(bare.bounding_boxes.len(), 1);
    let bbox = &bare.bounding_boxes[0];
    assert_eq!(bbox.crs_id, "EPSG:3857");
    // Coarsest matrix: 1 tile of 256px at pixelSize ~156543; the derived
    // extent spans the whole Web Mercator square.
    assert!((bbox.rect.min_x + 20037508.343).abs() < 1.0);
    assert!((bbox.rect.width() - 559082264.029 * 0.00028 * 256.0).abs() < 1.0);
}

const WMTS_MULTI_LINK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities version="1.0.0">
  <Contents>
    <Layer>
      <ows:Identifier>multi</ows:Identifier>
      <ows:Title>Multi</ows:Title>
      <Format>image/png</Format>
      <TileMatrixSetLink><TileMatrixSet>beta</TileMatrixSet></TileMatrixSetLink>
      <TileMatrixSetLink><TileMatrixSet>alpha</TileMatrixSet></TileMatrixSetLink>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>alpha</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::3857</ows:SupportedCRS>
      <TileMatrix>
        <ows:Identifier>0</ows:Identifier>
        <ScaleDenominator>559082264.029</ScaleDenominator>
        <TopLeftCorner>-20037508.343 20037508.343</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>1</MatrixWidth><MatrixHeight>1</MatrixHeight>
      </TileMatrix>
    </TileMatrixSet>
    <TileMatrixSet>
      <ows:Identifier>beta</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::4326</ows:SupportedCRS>
      <TileMatrix>
        <ows:Identifier>0</ows:Identifier>
        <ScaleDenominator>279541132.014358</ScaleDenominator>
        <TopLeftCorner>90 -180</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>2</MatrixWidth><MatrixHeight>1</MatrixHeight>
      </TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

#[test]
fn test_wmts_bbox_fallback_uses_first_link_only() {
    let model = parse_capabilities(WMTS_MULTI_LINK, &StaticAdviser::common()).unwrap();
    let layer = model.wmts_layer_by_title("Multi").unwrap();

    // Links are recorded in document order, independent of map iteration.
    assert_eq!(layer.matrix_set_link_order, vec!["beta", "alpha"]);

    // With no declared bbox, exactly one fallback is derived, and it comes
    // from the first linked set ("beta", EPSG:4326), never from "alpha".
    assert_eq!(layer.bounding_boxes.len(), 1);
    let bbox = &layer.bounding_boxes[0];
    assert_eq!(bbox.crs_id, "EPSG:4326");
    assert!((bbox.rect.min_x + 180.0).abs() < 1e-6);
    assert!((bbox.rect.max_x - 180.0).abs() < 1e-6);
    assert!((bbox.rect.min_y + 90.0).abs() < 1e-6);
    assert!((bbox.rect.max_y - 90.0).abs() < 1e-6);
}

#[test]
fn test_wmts_synthetic_default_style() {
    let model = parse_capabilities(WMTS, &StaticAdviser::common()).unwrap();
    let bare = model.wmts_layer_by_title("Bare").unwrap();
    let style = bare.styles.get("default").unwrap();
    assert_eq!(style.title, "Generated default style");
}

const WMTS_TIANDITU: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities version="1.0.0">
  <ows:OperationsMetadata>
    <ows:Operation name="GetTile">
      <ows:DCP><ows:HTTP>
        <ows:Get xlink:href="https://t0.tianditu.gov.cn/img_c/wmts"/>
      </ows:HTTP></ows:DCP>
    </ows:Operation>
  </ows:OperationsMetadata>
  <Contents>
    <Layer>
      <ows:Identifier>img</ows:Identifier>
      <ows:Title>img</ows:Title>
      <Format>image/png</Format>
      <ows:WGS84BoundingBox>
        <ows:LowerCorner>-180 -90</ows:LowerCorner>
        <ows:UpperCorner>180 90</ows:UpperCorner>
      </ows:WGS84BoundingBox>
      <TileMatrixSetLink><TileMatrixSet>c</TileMatrixSet></TileMatrixSetLink>
      <ResourceURL format="application/xml" resourceType="FeatureInfo"
        template="https://t0.tianditu.gov.cn/img_c/{TileMatrix}/{TileRow}/{TileCol}.xml"/>
    </Layer>
    <TileMatrixSet>
      <ows:Identifier>c</ows:Identifier>
      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::4326</ows:SupportedCRS>
      <TileMatrix>
        <ows:Identifier>2</ows:Identifier>
        <ScaleDenominator>147748796.52</ScaleDenominator>
        <TopLeftCorner>-180.0 90.0</TopLeftCorner>
        <TileWidth>256</TileWidth><TileHeight>256</TileHeight>
        <MatrixWidth>8</MatrixWidth><MatrixHeight>4</MatrixHeight>
      </TileMatrix>
    </TileMatrixSet>
  </Contents>
</Capabilities>"#;

#[test]
fn test_tianditu_pixel_size_and_corner_swap() {
    let model = parse_capabilities(WMTS_TIANDITU, &StaticAdviser::common()).unwrap();
    assert!(model.is_tianditu());

    let set = model.tile_matrix_sets.get("c").unwrap();
    assert_eq!(set.crs_id, "EPSG:4326");
    let matrix = set.matrix_by_identifier("2").unwrap();

    // The provider writes TopLeftCorner in lon/lat despite the lat-first
    // CRS; the compensating swap lands the corner back at (-180, 90).
    assert_eq!(matrix.top_left.x, -180.0);
    assert_eq!(matrix.top_left.y, 90.0);

    // 96 dpi pixel instead of the OGC 0.28 mm pixel.
    let expected = 147748796.52 * (0.0254 / 96.0) / 111319.49079327358;
    assert!((matrix.pixel_size - expected).abs() < 1e-9);
}

#[test]
fn test_feature_info_template_captured() {
    let model = parse_capabilities(WMTS_TIANDITU, &StaticAdviser::common()).unwrap();
    let layer = model.wmts_layer_by_title("img").unwrap();
    assert_eq!(
        layer.get_feature_info_templates.get("application/xml").unwrap(),
        "https://t0.tianditu.gov.cn/img_c/{TileMatrix}/{TileRow}/{TileCol}.xml"
    );
    assert!(layer.get_tile_templates.is_empty());
}

#[test]
fn test_reject_html_body() {
    let err = parse_capabilities("<html><body>login</body></html>", &StaticAdviser::common())
        .unwrap_err();
    assert!(matches!(err, CapabilitiesError::NotCapabilities));
    let err = parse_capabilities("<HTML></HTML>", &StaticAdviser::common()).unwrap_err();
    assert!(matches!(err, CapabilitiesError::NotCapabilities));
}

#[test]
fn test_reject_bad_root_tag() {
    let err = parse_capabilities("<Nope version=\"1.0\"/>", &StaticAdviser::common()).unwrap_err();
    assert!(matches!(err, CapabilitiesError::BadRootTag(_)));
}

#[test]
fn test_reject_empty_and_malformed() {
    assert!(matches!(
        parse_capabilities("", &StaticAdviser::common()).unwrap_err(),
        CapabilitiesError::EmptyDocument
    ));
    assert!(matches!(
        parse_capabilities("<WMS_Capabilities><Layer>", &StaticAdviser::common()).unwrap_err(),
        CapabilitiesError::MalformedXml(_)
    ));
}
